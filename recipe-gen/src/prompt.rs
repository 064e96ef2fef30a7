//! Form input, validation and the prompt template fed to the model.
//!
//! The prompt depends only on the title and the ingredients. Sampling settings
//! ride along in [`GenerationRequest`] but never touch the prompt text.

use serde::Deserialize;

use crate::error::SubmitError;

pub const DEFAULT_TITLE: &str = "Spicy Chicken Pasta";
pub const DEFAULT_INGREDIENTS: &str =
    "chicken breast, pasta, cayenne pepper, olive oil, garlic, tomatoes";

pub const TEMPERATURE_MIN: f32 = 0.2;
pub const TEMPERATURE_MAX: f32 = 1.5;
pub const TEMPERATURE_STEP: f32 = 0.1;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

pub const MAX_TOKENS_MIN: usize = 50;
pub const MAX_TOKENS_MAX: usize = 250;
pub const MAX_TOKENS_STEP: usize = 10;
pub const DEFAULT_MAX_TOKENS: usize = 150;

// Slider values arrive as decimal strings; 1.5 may parse a hair off.
const TEMPERATURE_SLACK: f32 = 1e-6;

/// Raw values as the user typed them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecipeForm {
    pub title: String,
    pub ingredients: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

fn default_max_tokens() -> usize {
    DEFAULT_MAX_TOKENS
}

impl Default for RecipeForm {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            ingredients: DEFAULT_INGREDIENTS.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl RecipeForm {
    pub fn new(title: impl Into<String>, ingredients: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ingredients: ingredients.into(),
            ..Self::default()
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// A validated, normalized submission. Lives for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub title: String,
    pub ingredients: Vec<String>,
    pub temperature: f32,
    pub max_tokens: usize,
}

impl GenerationRequest {
    /// Validates the form. Nothing here touches the model.
    pub fn from_form(form: &RecipeForm) -> Result<Self, SubmitError> {
        if form.title.trim().is_empty() || form.ingredients.trim().is_empty() {
            return Err(SubmitError::missing_fields());
        }
        check_temperature(form.temperature)?;
        check_max_tokens(form.max_tokens)?;

        Ok(Self {
            title: form.title.trim().to_lowercase(),
            ingredients: split_ingredients(&form.ingredients),
            temperature: form.temperature,
            max_tokens: form.max_tokens,
        })
    }

    pub fn prompt(&self) -> String {
        build_prompt(&self.title, &self.ingredients)
    }
}

fn check_temperature(temperature: f32) -> Result<(), SubmitError> {
    let in_range = temperature.is_finite()
        && temperature >= TEMPERATURE_MIN - TEMPERATURE_SLACK
        && temperature <= TEMPERATURE_MAX + TEMPERATURE_SLACK;
    if in_range {
        Ok(())
    } else {
        Err(SubmitError::Validation(format!(
            "Temperature must be between {TEMPERATURE_MIN} and {TEMPERATURE_MAX}."
        )))
    }
}

fn check_max_tokens(max_tokens: usize) -> Result<(), SubmitError> {
    if (MAX_TOKENS_MIN..=MAX_TOKENS_MAX).contains(&max_tokens) {
        Ok(())
    } else {
        Err(SubmitError::Validation(format!(
            "Max tokens must be between {MAX_TOKENS_MIN} and {MAX_TOKENS_MAX}."
        )))
    }
}

/// Splits on commas, trimming and lower-casing each entry.
///
/// Empty entries between commas are kept; there is no de-duplication.
pub fn split_ingredients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|ingredient| ingredient.trim().to_lowercase())
        .collect()
}

/// Renders the three-line template. `title` and `ingredients` are taken as
/// given, so callers normalize first (see [`GenerationRequest::from_form`]).
pub fn build_prompt(title: &str, ingredients: &[String]) -> String {
    format!(
        "TITLE: {}\nINGREDIENTS: {}\nRECIPE:",
        title,
        ingredients.join(", ")
    )
}

/// Capitalizes every whitespace-separated word for the recipe heading.
pub fn title_case(raw: &str) -> String {
    raw.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_exact_template() {
        let form = RecipeForm::new(" Spicy Chicken Pasta ", "Chicken Breast, PASTA , cayenne pepper");
        let request = GenerationRequest::from_form(&form).unwrap();
        assert_eq!(
            request.prompt(),
            "TITLE: spicy chicken pasta\nINGREDIENTS: chicken breast, pasta, cayenne pepper\nRECIPE:"
        );
    }

    #[test]
    fn title_is_lowercased_as_a_whole() {
        let form = RecipeForm::new("  MiXeD   Case  Title\t", "salt");
        let request = GenerationRequest::from_form(&form).unwrap();
        assert_eq!(request.title, "mixed   case  title");
    }

    #[test]
    fn keeps_empty_and_duplicate_ingredients() {
        assert_eq!(
            split_ingredients("Salt,, salt ,Pepper!"),
            vec!["salt", "", "salt", "pepper!"]
        );
    }

    #[test]
    fn rejects_blank_fields() {
        for (title, ingredients) in [("", "salt"), ("soup", ""), ("   ", "salt"), ("soup", " \n\t ")] {
            let err = GenerationRequest::from_form(&RecipeForm::new(title, ingredients)).unwrap_err();
            assert_eq!(err, SubmitError::missing_fields());
        }
    }

    #[test]
    fn accepts_slider_bounds_unchanged() {
        for (temperature, max_tokens) in [(TEMPERATURE_MIN, MAX_TOKENS_MIN), (TEMPERATURE_MAX, MAX_TOKENS_MAX)] {
            let form = RecipeForm::new("soup", "water")
                .with_temperature(temperature)
                .with_max_tokens(max_tokens);
            let request = GenerationRequest::from_form(&form).unwrap();
            assert_eq!(request.temperature, temperature);
            assert_eq!(request.max_tokens, max_tokens);
        }
    }

    #[test]
    fn rejects_out_of_range_sliders() {
        let base = RecipeForm::new("soup", "water");
        for form in [
            base.clone().with_temperature(0.1),
            base.clone().with_temperature(1.6),
            base.clone().with_temperature(f32::NAN),
            base.clone().with_max_tokens(40),
            base.clone().with_max_tokens(260),
        ] {
            assert!(matches!(
                GenerationRequest::from_form(&form),
                Err(SubmitError::Validation(_))
            ));
        }
    }

    #[test]
    fn settings_do_not_change_prompt() {
        let cold = RecipeForm::new("Soup", "Water").with_temperature(0.2);
        let hot = RecipeForm::new("Soup", "Water").with_temperature(1.5).with_max_tokens(250);
        assert_eq!(
            GenerationRequest::from_form(&cold).unwrap().prompt(),
            GenerationRequest::from_form(&hot).unwrap().prompt()
        );
    }

    #[test]
    fn heading_is_title_cased() {
        assert_eq!(title_case(" spicy CHICKEN pasta "), "Spicy Chicken Pasta");
        assert_eq!(title_case(""), "");
    }
}
