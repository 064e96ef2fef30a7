//! Binary weight file (`model.bin`).
//!
//! Layout: magic `RCPE`, `u32` version, then every tensor in traversal order
//! (embedding; per block attn_norm, wq, wk, wv, wo, ffn_norm, w1, w2; final
//! norm; head). A tensor is `u32` rank, `u32` dims, then `f32` values. Linear
//! layers write a `u8` bias flag followed by the bias tensor when set. All
//! integers and floats are little-endian.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use bytemuck::cast_slice;
use memmap2::MmapOptions;
use ndarray::{Array1, Array2};

use crate::error::LoadError;
use crate::model::{Attention, Block, Embedding, Linear, ModelArgs, RMSNorm, Transformer, MLP};

const MAGIC: &[u8; 4] = b"RCPE";
const VERSION: u32 = 1;

pub fn save(model: &Transformer, path: &Path) -> Result<(), LoadError> {
    let file = File::create(path).map_err(|e| LoadError::io(path, e))?;
    let mut w = CheckpointWriter {
        inner: BufWriter::new(file),
    };
    w.write_model(model).map_err(|e| LoadError::io(path, e))
}

/// Reads `path` through a memory map and checks every tensor against `args`.
pub fn load(path: &Path, args: &ModelArgs) -> Result<Transformer, LoadError> {
    args.validate()?;
    let file = File::open(path).map_err(|e| LoadError::io(path, e))?;
    // The map is read once into owned arrays and dropped before returning.
    let mmap = unsafe { MmapOptions::new().map(&file) }.map_err(|e| LoadError::io(path, e))?;
    let mut r = CheckpointReader { buf: &mmap[..], offset: 0 };

    if r.take(4)? != MAGIC {
        return Err(LoadError::Checkpoint("bad magic".into()));
    }
    let version = r.u32()?;
    if version != VERSION {
        return Err(LoadError::Checkpoint(format!("unsupported version {version}")));
    }

    let embed = Embedding {
        weight: r.matrix(args.vocab_size, args.dim)?,
    };
    let layers = (0..args.n_layers)
        .map(|_| r.block(args))
        .collect::<Result<Vec<_>, _>>()?;
    let norm = RMSNorm::from_weight(r.vector(args.dim)?);
    let head = r.linear(args.dim, args.vocab_size)?;

    if r.offset != r.buf.len() {
        return Err(LoadError::Checkpoint(format!(
            "{} trailing bytes",
            r.buf.len() - r.offset
        )));
    }
    Ok(Transformer {
        args: args.clone(),
        embed,
        layers,
        norm,
        head,
    })
}

struct CheckpointWriter<W: Write> {
    inner: W,
}

impl<W: Write> CheckpointWriter<W> {
    fn write_model(&mut self, model: &Transformer) -> std::io::Result<()> {
        self.inner.write_all(MAGIC)?;
        self.inner.write_all(&VERSION.to_le_bytes())?;
        self.matrix(&model.embed.weight)?;
        for block in &model.layers {
            self.vector(&block.attn_norm.weight)?;
            for linear in [&block.attn.wq, &block.attn.wk, &block.attn.wv, &block.attn.wo] {
                self.linear(linear)?;
            }
            self.vector(&block.ffn_norm.weight)?;
            self.linear(&block.ffn.w1)?;
            self.linear(&block.ffn.w2)?;
        }
        self.vector(&model.norm.weight)?;
        self.linear(&model.head)?;
        self.inner.flush()
    }

    fn linear(&mut self, linear: &Linear) -> std::io::Result<()> {
        self.matrix(&linear.weight)?;
        match &linear.bias {
            Some(b) => {
                self.inner.write_all(&[1])?;
                self.vector(b)
            }
            None => self.inner.write_all(&[0]),
        }
    }

    fn matrix(&mut self, t: &Array2<f32>) -> std::io::Result<()> {
        self.header(&[t.nrows(), t.ncols()])?;
        self.values(t.iter().copied().collect())
    }

    fn vector(&mut self, t: &Array1<f32>) -> std::io::Result<()> {
        self.header(&[t.len()])?;
        self.values(t.to_vec())
    }

    fn header(&mut self, dims: &[usize]) -> std::io::Result<()> {
        self.inner.write_all(&(dims.len() as u32).to_le_bytes())?;
        for &d in dims {
            self.inner.write_all(&(d as u32).to_le_bytes())?;
        }
        Ok(())
    }

    fn values(&mut self, values: Vec<f32>) -> std::io::Result<()> {
        if cfg!(target_endian = "little") {
            self.inner.write_all(cast_slice(&values))
        } else {
            values
                .iter()
                .try_for_each(|v| self.inner.write_all(&v.to_le_bytes()))
        }
    }
}

struct CheckpointReader<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> CheckpointReader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], LoadError> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|&end| end <= self.buf.len())
            .ok_or_else(|| LoadError::Checkpoint(format!("truncated at byte {}", self.offset)))?;
        let bytes = &self.buf[self.offset..end];
        self.offset = end;
        Ok(bytes)
    }

    fn u32(&mut self) -> Result<u32, LoadError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn expect_dims(&mut self, expected: &[usize]) -> Result<(), LoadError> {
        let rank = self.u32()? as usize;
        let mut dims = Vec::with_capacity(rank);
        for _ in 0..rank {
            dims.push(self.u32()? as usize);
        }
        if dims != expected {
            return Err(LoadError::Checkpoint(format!(
                "tensor shape {dims:?} does not match config {expected:?}"
            )));
        }
        Ok(())
    }

    fn values(&mut self, count: usize) -> Result<Vec<f32>, LoadError> {
        let bytes = self.take(count * 4)?;
        Ok(bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    fn matrix(&mut self, rows: usize, cols: usize) -> Result<Array2<f32>, LoadError> {
        self.expect_dims(&[rows, cols])?;
        let values = self.values(rows * cols)?;
        Array2::from_shape_vec((rows, cols), values)
            .map_err(|e| LoadError::Checkpoint(e.to_string()))
    }

    fn vector(&mut self, len: usize) -> Result<Array1<f32>, LoadError> {
        self.expect_dims(&[len])?;
        Ok(Array1::from(self.values(len)?))
    }

    fn linear(&mut self, in_features: usize, out_features: usize) -> Result<Linear, LoadError> {
        let weight = self.matrix(out_features, in_features)?;
        let bias = match self.take(1)?[0] {
            0 => None,
            1 => Some(self.vector(out_features)?),
            flag => return Err(LoadError::Checkpoint(format!("bad bias flag {flag}"))),
        };
        Ok(Linear { weight, bias })
    }

    fn block(&mut self, args: &ModelArgs) -> Result<Block, LoadError> {
        let attn_norm = RMSNorm::from_weight(self.vector(args.dim)?);
        let wq = self.linear(args.dim, args.dim)?;
        let wk = self.linear(args.dim, args.dim)?;
        let wv = self.linear(args.dim, args.dim)?;
        let wo = self.linear(args.dim, args.dim)?;
        let ffn_norm = RMSNorm::from_weight(self.vector(args.dim)?);
        let w1 = self.linear(args.dim, args.hidden_dim)?;
        let w2 = self.linear(args.hidden_dim, args.dim)?;
        Ok(Block {
            attn_norm,
            attn: Attention::from_parts([wq, wk, wv, wo], args.n_heads),
            ffn_norm,
            ffn: MLP { w1, w2 },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn tiny() -> ModelArgs {
        ModelArgs {
            max_seq_len: 8,
            vocab_size: 12,
            dim: 8,
            n_layers: 2,
            n_heads: 2,
            hidden_dim: 16,
        }
    }

    #[test]
    fn reload_gives_identical_logits() {
        let model = Transformer::seeded(tiny(), 11);
        let file = NamedTempFile::new().unwrap();
        save(&model, file.path()).unwrap();
        let loaded = load(file.path(), &tiny()).unwrap();
        assert_eq!(model.forward(&[0, 3, 7]), loaded.forward(&[0, 3, 7]));
    }

    #[test]
    fn shape_mismatch_is_reported() {
        let model = Transformer::seeded(tiny(), 11);
        let file = NamedTempFile::new().unwrap();
        save(&model, file.path()).unwrap();
        let mut wider = tiny();
        wider.vocab_size = 13;
        let err = load(file.path(), &wider).err().unwrap();
        assert!(matches!(err, LoadError::Checkpoint(_)));
    }

    #[test]
    fn truncated_file_is_reported() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"RCPE\x01\x00").unwrap();
        assert!(matches!(load(file.path(), &tiny()), Err(LoadError::Checkpoint(_))));
    }

    #[test]
    fn wrong_magic_is_reported() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"GGUF\x01\x00\x00\x00").unwrap();
        let err = load(file.path(), &tiny()).err().unwrap();
        assert_eq!(err.to_string(), "corrupt checkpoint: bad magic");
    }
}
