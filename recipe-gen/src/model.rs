use ndarray::{s, Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::LoadError;

/// Configuration for the transformer model, stored as `config.json`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelArgs {
    /// Longest context the model attends over.
    pub max_seq_len: usize,
    /// Vocabulary size.
    pub vocab_size: usize,
    /// Width of the residual stream.
    pub dim: usize,
    /// Number of layers.
    pub n_layers: usize,
    /// Number of attention heads.
    pub n_heads: usize,
    /// Inner width of each feed-forward network.
    pub hidden_dim: usize,
}

impl Default for ModelArgs {
    fn default() -> Self {
        Self {
            max_seq_len: 128,
            vocab_size: 1024,
            dim: 64,
            n_layers: 2,
            n_heads: 4,
            hidden_dim: 256,
        }
    }
}

impl ModelArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Small CPU-friendly shape over the given vocabulary.
    pub fn for_vocab(vocab_size: usize) -> Self {
        Self {
            max_seq_len: 64,
            vocab_size,
            dim: 32,
            n_layers: 2,
            n_heads: 4,
            hidden_dim: 64,
        }
    }

    pub fn validate(&self) -> Result<(), LoadError> {
        let sizes = [
            ("max_seq_len", self.max_seq_len),
            ("vocab_size", self.vocab_size),
            ("dim", self.dim),
            ("n_heads", self.n_heads),
            ("hidden_dim", self.hidden_dim),
        ];
        if let Some((name, _)) = sizes.iter().find(|(_, v)| *v == 0) {
            return Err(LoadError::InvalidConfig(format!("{name} must be positive")));
        }
        if self.dim % self.n_heads != 0 {
            return Err(LoadError::InvalidConfig(format!(
                "dim {} is not divisible by n_heads {}",
                self.dim, self.n_heads
            )));
        }
        Ok(())
    }
}

fn random_matrix(rows: usize, cols: usize, rng: &mut impl Rng) -> Array2<f32> {
    Array2::from_shape_fn((rows, cols), |_| rng.gen_range(-0.1..0.1))
}

/// Token embedding table, one row per vocabulary piece.
pub struct Embedding {
    pub(crate) weight: Array2<f32>, // vocab_size x dim
}

impl Embedding {
    pub fn new(vocab_size: usize, dim: usize, rng: &mut impl Rng) -> Self {
        Self {
            weight: random_matrix(vocab_size, dim, rng),
        }
    }

    pub fn forward(&self, tokens: &[usize]) -> Array2<f32> {
        let mut out = Array2::<f32>::zeros((tokens.len(), self.weight.ncols()));
        for (i, &tok) in tokens.iter().enumerate() {
            out.row_mut(i).assign(&self.weight.row(tok));
        }
        out
    }
}

/// Dense projection, `y = x W^T + b`.
pub struct Linear {
    pub(crate) weight: Array2<f32>, // out x in
    pub(crate) bias: Option<Array1<f32>>,
}

impl Linear {
    pub fn new(in_features: usize, out_features: usize, bias: bool, rng: &mut impl Rng) -> Self {
        let weight = random_matrix(out_features, in_features, rng);
        let bias = if bias {
            Some(Array1::from_shape_fn(out_features, |_| rng.gen_range(-0.1..0.1)))
        } else {
            None
        };
        Self { weight, bias }
    }

    pub fn forward(&self, x: &Array2<f32>) -> Array2<f32> {
        let mut y = x.dot(&self.weight.t());
        if let Some(b) = &self.bias {
            y += &b.view().insert_axis(Axis(0));
        }
        y
    }
}

/// RMS normalization with a learned per-channel gain.
pub struct RMSNorm {
    pub(crate) weight: Array1<f32>,
    eps: f32,
}

impl RMSNorm {
    pub fn new(dim: usize) -> Self {
        Self::from_weight(Array1::ones(dim))
    }

    pub(crate) fn from_weight(weight: Array1<f32>) -> Self {
        Self { weight, eps: 1e-6 }
    }

    pub fn forward(&self, x: &Array2<f32>) -> Array2<f32> {
        let mean = x
            .mapv(|v| v * v)
            .mean_axis(Axis(1))
            .unwrap_or_else(|| Array1::zeros(x.nrows()));
        let denom = mean.mapv(|m| (m + self.eps).sqrt()).insert_axis(Axis(1));
        let norm = x / &denom;
        norm * &self.weight.view().insert_axis(Axis(0))
    }
}

/// Multi-head causal self attention.
pub struct Attention {
    pub(crate) wq: Linear,
    pub(crate) wk: Linear,
    pub(crate) wv: Linear,
    pub(crate) wo: Linear,
    n_heads: usize,
    head_dim: usize,
}

impl Attention {
    pub fn new(dim: usize, n_heads: usize, rng: &mut impl Rng) -> Self {
        Self::from_parts(
            [
                Linear::new(dim, dim, false, rng),
                Linear::new(dim, dim, false, rng),
                Linear::new(dim, dim, false, rng),
                Linear::new(dim, dim, false, rng),
            ],
            n_heads,
        )
    }

    pub(crate) fn from_parts(projections: [Linear; 4], n_heads: usize) -> Self {
        let [wq, wk, wv, wo] = projections;
        let head_dim = wq.weight.nrows() / n_heads;
        Self {
            wq,
            wk,
            wv,
            wo,
            n_heads,
            head_dim,
        }
    }

    /// Causal attention: position `i` only sees positions `0..=i`.
    pub fn forward(&self, x: &Array2<f32>) -> Array2<f32> {
        let q = self.wq.forward(x);
        let k = self.wk.forward(x);
        let v = self.wv.forward(x);
        let seq = x.nrows();

        let mut out = Array2::<f32>::zeros((seq, self.n_heads * self.head_dim));
        for h in 0..self.n_heads {
            let cols = h * self.head_dim..(h + 1) * self.head_dim;
            let qh = q.slice(s![.., cols.clone()]);
            let kh = k.slice(s![.., cols.clone()]);
            let vh = v.slice(s![.., cols.clone()]);

            let mut out_h = out.slice_mut(s![.., cols]);
            for i in 0..seq {
                // scores against the visible prefix, then softmax
                let mut scores: Vec<f32> = (0..=i)
                    .map(|j| qh.row(i).dot(&kh.row(j)) / (self.head_dim as f32).sqrt())
                    .collect();
                let max = scores.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
                let mut sum = 0.0;
                for score in scores.iter_mut() {
                    *score = (*score - max).exp();
                    sum += *score;
                }
                for (j, score) in scores.iter().enumerate() {
                    let coeff = score / sum;
                    for d in 0..self.head_dim {
                        out_h[[i, d]] += coeff * vh[[j, d]];
                    }
                }
            }
        }
        self.wo.forward(&out)
    }
}

/// Two-layer feed-forward network with a SiLU in between.
pub struct MLP {
    pub(crate) w1: Linear,
    pub(crate) w2: Linear,
}

impl MLP {
    pub fn new(dim: usize, hidden_dim: usize, rng: &mut impl Rng) -> Self {
        Self {
            w1: Linear::new(dim, hidden_dim, false, rng),
            w2: Linear::new(hidden_dim, dim, false, rng),
        }
    }

    pub fn forward(&self, x: &Array2<f32>) -> Array2<f32> {
        let hidden = self.w1.forward(x).mapv(|v| v * (1.0 / (1.0 + (-v).exp()))); // silu
        self.w2.forward(&hidden)
    }
}

/// Pre-norm residual block: attention, then feed-forward.
pub struct Block {
    pub(crate) attn_norm: RMSNorm,
    pub(crate) attn: Attention,
    pub(crate) ffn_norm: RMSNorm,
    pub(crate) ffn: MLP,
}

impl Block {
    pub fn new(args: &ModelArgs, rng: &mut impl Rng) -> Self {
        Self {
            attn_norm: RMSNorm::new(args.dim),
            attn: Attention::new(args.dim, args.n_heads, rng),
            ffn_norm: RMSNorm::new(args.dim),
            ffn: MLP::new(args.dim, args.hidden_dim, rng),
        }
    }

    pub fn forward(&self, x: &Array2<f32>) -> Array2<f32> {
        let h = self.attn_norm.forward(x);
        let h = self.attn.forward(&h);
        let x = x + &h;
        let h = self.ffn_norm.forward(&x);
        let h = self.ffn.forward(&h);
        x + &h
    }
}

/// Decoder-only language model behind [`crate::LocalGenerator`].
pub struct Transformer {
    pub args: ModelArgs,
    pub(crate) embed: Embedding,
    pub(crate) layers: Vec<Block>,
    pub(crate) norm: RMSNorm,
    pub(crate) head: Linear,
}

impl Transformer {
    /// Randomly initialized model.
    pub fn new(args: ModelArgs) -> Self {
        Self::with_rng(args, &mut rand::thread_rng())
    }

    /// Randomly initialized model; the same seed gives the same weights.
    pub fn seeded(args: ModelArgs, seed: u64) -> Self {
        Self::with_rng(args, &mut StdRng::seed_from_u64(seed))
    }

    fn with_rng(args: ModelArgs, rng: &mut impl Rng) -> Self {
        let embed = Embedding::new(args.vocab_size, args.dim, rng);
        let layers = (0..args.n_layers).map(|_| Block::new(&args, rng)).collect();
        let norm = RMSNorm::new(args.dim);
        let head = Linear::new(args.dim, args.vocab_size, false, rng);
        Self { args, embed, layers, norm, head }
    }

    pub fn forward(&self, tokens: &[usize]) -> Array2<f32> {
        let mut h = self.embed.forward(tokens);
        for layer in &self.layers {
            h = layer.forward(&h);
        }
        let h = self.norm.forward(&h);
        self.head.forward(&h)
    }

    /// Logits for the token after `tokens`, looking at no more than
    /// `max_seq_len` trailing tokens.
    pub fn next_token_logits(&self, tokens: &[usize]) -> Array1<f32> {
        let start = tokens.len().saturating_sub(self.args.max_seq_len);
        let logits = self.forward(&tokens[start..]);
        match logits.nrows() {
            0 => Array1::zeros(self.args.vocab_size),
            n => logits.row(n - 1).to_owned(),
        }
    }
}
