//! # Sentence Encoder
//!
//! Two independent stacks of LSTM cells read the embedded sentence, one left
//! to right over `[SOS, w_1, …, w_n]` and one right to left over
//! `[EOS, w_n, …, w_1]`. State starts from zero for every sentence. The
//! outputs that follow the sentinel step are realigned so row `i` of both
//! directions describes word `i`.

use candle_core::{Result, Tensor};
use candle_nn::rnn::{LSTMConfig, RNN, LSTM, lstm};
use candle_nn::VarBuilder;

/// Per-position context vectors, both of shape `[n, rnn_hidden]`.
#[derive(Debug, Clone)]
pub struct Encoded {
    pub l2r: Tensor,
    pub r2l: Tensor,
}

impl Encoded {
    pub fn len(&self) -> usize {
        self.l2r.dims().first().copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Forward and backward multi-layer LSTM stacks.
pub struct SentenceEncoder {
    l2r: Vec<LSTM>,
    r2l: Vec<LSTM>,
}

impl SentenceEncoder {
    pub fn new(input_dim: usize, hidden: usize, layers: usize, vb: VarBuilder) -> Result<Self> {
        let l2r = Self::stack(input_dim, hidden, layers, vb.pp("l2r"))?;
        let r2l = Self::stack(input_dim, hidden, layers, vb.pp("r2l"))?;
        Ok(Self { l2r, r2l })
    }

    fn stack(input_dim: usize, hidden: usize, layers: usize, vb: VarBuilder) -> Result<Vec<LSTM>> {
        (0..layers)
            .map(|layer| {
                let in_dim = if layer == 0 { input_dim } else { hidden };
                lstm(in_dim, hidden, LSTMConfig::default(), vb.pp(layer))
            })
            .collect()
    }

    /// Encode a sentence of `n >= 1` words.
    ///
    /// `l2r_inputs` holds the embeddings of `[SOS, w_1, …, w_n]` and
    /// `r2l_inputs` those of `[EOS, w_n, …, w_1]`, each `[n + 1, input_dim]`.
    pub fn encode(&self, l2r_inputs: &Tensor, r2l_inputs: &Tensor) -> Result<Encoded> {
        let steps = l2r_inputs.dim(0)?;
        let n = steps - 1;

        let l2r = Self::run(&self.l2r, l2r_inputs)?.narrow(0, 1, n)?;
        let r2l = Self::run(&self.r2l, r2l_inputs)?.narrow(0, 1, n)?;

        let reversed: Vec<u32> = (0..n as u32).rev().collect();
        let reversed = Tensor::new(reversed.as_slice(), r2l.device())?;
        let r2l = r2l.index_select(&reversed, 0)?;

        Ok(Encoded { l2r, r2l })
    }

    /// Feed `inputs` through every layer of `stack`; returns the top layer's
    /// hidden state at each step, `[steps, hidden]`.
    fn run(stack: &[LSTM], inputs: &Tensor) -> Result<Tensor> {
        let mut xs = inputs.clone();
        for cell in stack {
            let states = cell.seq(&xs.unsqueeze(0)?)?;
            let hs: Vec<Tensor> = states.iter().map(|s| s.h().clone()).collect();
            xs = Tensor::cat(&hs, 0)?;
        }
        Ok(xs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    fn encoder(layers: usize) -> (VarMap, SentenceEncoder) {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let encoder = SentenceEncoder::new(4, 6, layers, vb).unwrap();
        (varmap, encoder)
    }

    #[test]
    fn test_output_shapes() {
        let (_varmap, encoder) = encoder(2);
        let inputs = Tensor::ones((4, 4), DType::F32, &Device::Cpu).unwrap();

        let encoded = encoder.encode(&inputs, &inputs).unwrap();
        assert_eq!(encoded.len(), 3);
        assert_eq!(encoded.l2r.dims(), &[3, 6]);
        assert_eq!(encoded.r2l.dims(), &[3, 6]);
    }

    #[test]
    fn test_directions_have_separate_parameters() {
        let (varmap, _encoder) = encoder(2);
        let data = varmap.data().lock().unwrap();
        // 4 tensors per LSTM cell, 2 layers, 2 directions.
        assert_eq!(data.len(), 16);
        assert!(data.keys().any(|k| k.starts_with("l2r.1.")));
        assert!(data.keys().any(|k| k.starts_with("r2l.0.")));
    }

    #[test]
    fn test_r2l_is_realigned() {
        let (_varmap, encoder) = encoder(1);
        let device = Device::Cpu;
        // Distinct rows so the reverse pass sees a different sequence.
        let rows: Vec<f32> = (0..12).map(|v| v as f32 / 10.0).collect();
        let inputs = Tensor::from_vec(rows, (3, 4), &device).unwrap();

        let encoded = encoder.encode(&inputs, &inputs).unwrap();
        // The backward output at the first word has seen the whole sequence,
        // the last one only the sentinel and one word.
        let first = encoded.r2l.get(0).unwrap().to_vec1::<f32>().unwrap();
        let last = encoded.r2l.get(1).unwrap().to_vec1::<f32>().unwrap();
        assert_ne!(first, last);
    }
}
