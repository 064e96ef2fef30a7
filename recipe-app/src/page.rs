//! HTML for the recipe form and its output region.

use std::fmt::Write;

use recipe_gen::error::MODEL_UNAVAILABLE_MESSAGE;
use recipe_gen::prompt::{
    MAX_TOKENS_MAX, MAX_TOKENS_MIN, MAX_TOKENS_STEP, TEMPERATURE_MAX, TEMPERATURE_MIN,
    TEMPERATURE_STEP,
};
use recipe_gen::{RecipeCard, RecipeForm};

const STYLE: &str = r#"
    body {
        background-color: #f0f2f6;
        font-family: sans-serif;
        margin: 0;
        padding: 20px;
    }
    .title-container {
        text-align: center;
        padding: 20px;
        background-color: #ffffff;
        border-radius: 10px;
        box-shadow: 0 4px 12px rgba(0,0,0,0.05);
        margin-bottom: 20px;
    }
    .title-container h1 {
        font-size: 2.5em;
        font-weight: 700;
        color: #2a3a4b;
    }
    .title-container p {
        font-size: 1.1em;
        color: #556;
    }
    .columns {
        display: grid;
        grid-template-columns: 1fr 1fr;
        gap: 40px;
    }
    form label { display: block; margin-top: 12px; font-weight: 600; }
    form input[type=text], form textarea { width: 100%; padding: 8px; box-sizing: border-box; }
    form textarea { height: 150px; }
    .submit {
        margin-top: 16px;
        background-color: #28a745;
        color: white;
        border: none;
        padding: 10px 20px;
        border-radius: 8px;
        font-size: 1.1em;
        font-weight: bold;
        transition: all 0.3s ease;
        width: 100%;
    }
    .submit:hover {
        background-color: #218838;
        box-shadow: 0 4px 8px rgba(0,0,0,0.1);
    }
    .submit:disabled { background-color: #9aa5a0; }
    .recipe-box {
        background-color: #ffffff;
        border: 1px solid #ddd;
        border-radius: 10px;
        padding: 25px;
        box-shadow: 0 4px 12px rgba(0,0,0,0.05);
        min-height: 400px;
    }
    .recipe-box h3 {
        color: #2a3a4b;
        border-bottom: 2px solid #28a745;
        padding-bottom: 10px;
    }
    .recipe-box p {
        font-size: 1.05em;
        line-height: 1.6;
        color: #333;
    }
    .error { color: #b00020; font-weight: 600; }
    .info { color: #556; }
"#;

/// Contents of the output column.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Placeholder,
    Recipe(RecipeCard),
    Error(String),
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn recipe_box(card: &RecipeCard) -> String {
    let body = escape_html(&card.result.display_text).replace('\n', "<br>");
    format!(
        "<div class=\"recipe-box\"><h3>{}</h3><p>{}</p></div>",
        escape_html(&card.heading),
        body
    )
}

fn output_html(output: &Output) -> String {
    match output {
        Output::Placeholder => {
            "<p class=\"info\">Your generated recipe will appear here once you submit your ingredients.</p>"
                .to_string()
        }
        Output::Recipe(card) => recipe_box(card),
        Output::Error(message) => format!("<p class=\"error\">{}</p>", escape_html(message)),
    }
}

/// Renders the whole page. `model_ready` is `None` while the model has not
/// been loaded yet and `Some(false)` once loading failed, which disables the
/// form.
pub fn render_page(form: &RecipeForm, output: &Output, model_ready: Option<bool>) -> String {
    let mut html = String::new();
    let _ = write!(
        html,
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>Recipe Generator</title><style>{STYLE}</style></head><body>"
    );
    html.push_str(
        "<div class=\"title-container\"><h1>AI Recipe Generator</h1>\
         <p>Turn your ingredients into a delicious dish with the help of a language model.</p></div>",
    );

    match model_ready {
        Some(false) => {
            let _ = write!(html, "<p class=\"error\">{}</p>", escape_html(MODEL_UNAVAILABLE_MESSAGE));
        }
        None => html.push_str("<p class=\"info\">Warming up the AI chef... This may take a moment.</p>"),
        Some(true) => {}
    }

    let disabled = if model_ready == Some(false) { " disabled" } else { "" };
    let _ = write!(
        html,
        "<div class=\"columns\"><div><h2>What's in your kitchen?</h2>\
         <form method=\"post\" action=\"/generate\">\
         <label for=\"title\">What do you want to make?</label>\
         <input type=\"text\" id=\"title\" name=\"title\" value=\"{title}\" title=\"Give your recipe a name.\">\
         <label for=\"ingredients\">What ingredients do you have?</label>\
         <textarea id=\"ingredients\" name=\"ingredients\" title=\"Enter ingredients, separated by commas.\">{ingredients}</textarea>\
         <details><summary>Tweak the AI's Creativity</summary>\
         <label for=\"temperature\">Creativity (Temperature) <output>{temperature:.1}</output></label>\
         <input type=\"range\" id=\"temperature\" name=\"temperature\" min=\"{t_min}\" max=\"{t_max}\" step=\"{t_step}\" value=\"{temperature:.1}\" \
         oninput=\"this.previousElementSibling.lastElementChild.value=this.value\">\
         <label for=\"max_tokens\">Recipe Length (Max Tokens) <output>{max_tokens}</output></label>\
         <input type=\"range\" id=\"max_tokens\" name=\"max_tokens\" min=\"{m_min}\" max=\"{m_max}\" step=\"{m_step}\" value=\"{max_tokens}\" \
         oninput=\"this.previousElementSibling.lastElementChild.value=this.value\">\
         </details>\
         <button type=\"submit\" class=\"submit\"{disabled}>Generate Recipe</button>\
         </form></div>",
        title = escape_html(&form.title),
        ingredients = escape_html(&form.ingredients),
        temperature = form.temperature,
        max_tokens = form.max_tokens,
        t_min = TEMPERATURE_MIN,
        t_max = TEMPERATURE_MAX,
        t_step = TEMPERATURE_STEP,
        m_min = MAX_TOKENS_MIN,
        m_max = MAX_TOKENS_MAX,
        m_step = MAX_TOKENS_STEP,
    );

    let _ = write!(
        html,
        "<div><h2>Your Generated Recipe</h2>{}</div></div></body></html>",
        output_html(output)
    );
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use recipe_gen::GenerationResult;

    fn card(text: &str) -> RecipeCard {
        RecipeCard {
            heading: "Soup".into(),
            result: GenerationResult {
                raw_text: text.into(),
                display_text: text.into(),
            },
        }
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape_html("<b>\"a\" & 'b'</b>"), "&lt;b&gt;&quot;a&quot; &amp; &#39;b&#39;&lt;/b&gt;");
    }

    #[test]
    fn recipe_lines_become_breaks() {
        let html = render_page(
            &RecipeForm::default(),
            &Output::Recipe(card("1. Boil <water>.\n\n2. Serve.")),
            Some(true),
        );
        assert!(html.contains("<h3>Soup</h3><p>1. Boil &lt;water&gt;.<br><br>2. Serve.</p>"));
        assert!(!html.contains(" disabled"));
    }

    #[test]
    fn failed_model_disables_the_form() {
        let html = render_page(&RecipeForm::default(), &Output::Placeholder, Some(false));
        assert!(html.contains(MODEL_UNAVAILABLE_MESSAGE));
        assert!(html.contains("class=\"submit\" disabled"));
    }

    #[test]
    fn form_keeps_submitted_values() {
        let form = RecipeForm::new("Tom & Jerry's", "cheese").with_temperature(1.2).with_max_tokens(90);
        let html = render_page(&form, &Output::Error("Please provide both a title and ingredients.".into()), None);
        assert!(html.contains("value=\"Tom &amp; Jerry&#39;s\""));
        assert!(html.contains("value=\"1.2\""));
        assert!(html.contains("value=\"90\""));
        assert!(html.contains("<p class=\"error\">Please provide both a title and ingredients.</p>"));
        assert!(html.contains("Warming up the AI chef"));
    }
}
