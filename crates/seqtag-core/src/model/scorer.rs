//! # Tag-Conditioned Scorer
//!
//! Turns encoder output into per-tag scores. The hidden layer is
//! `relu(W_l·h_l2r[i] + W_r·h_r2l[i] + b [+ W_t·tag_emb(tag[i-1])])`, projected
//! to one score per real tag. The output head is picked at construction:
//!
//! - [`OutputHeadKind::Softmax`] conditions each position on the previous tag
//!   and is trained with per-position cross-entropy;
//! - [`OutputHeadKind::Crf`] drops the previous-tag input, learns a transition
//!   matrix instead and is trained with the sequence log-likelihood.

use candle_core::{D, Device, Result, Tensor};
use candle_nn::{Embedding, Init, Linear, Module, VarBuilder};
use serde::{Deserialize, Serialize};

use crate::model::decoder::{TagSource, argmax};
use crate::model::encoder::Encoded;

/// Output head strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputHeadKind {
    /// Per-position softmax conditioned on the previous tag, greedy decoding.
    #[default]
    Softmax,
    /// Linear-chain CRF over unconditioned emissions, Viterbi decoding.
    Crf,
}

/// Dimensions the scorer is built from.
#[derive(Debug, Clone, Copy)]
pub struct ScorerDims {
    pub rnn_hidden: usize,
    pub tag_hidden: usize,
    pub tag_dim: usize,
    /// Real output tags, excluding the SOS-tag sentinel.
    pub num_tags: usize,
}

enum Head {
    Softmax {
        tag_embedding: Embedding,
        tag_proj: Linear,
        sos_tag: u32,
    },
    Crf {
        /// `[num_tags + 1, num_tags]`; the last row scores the first position.
        transitions: Tensor,
    },
}

/// Scores of one sentence plus each position's argmax.
pub struct Scored {
    /// `[n, num_tags]`.
    pub logits: Tensor,
    /// Argmax tag per position, taken before any loss is applied.
    pub argmax: Vec<u32>,
}

pub struct TagScorer {
    l2r_proj: Linear,
    r2l_proj: Linear,
    output: Linear,
    head: Head,
    num_tags: usize,
}

impl TagScorer {
    pub fn new(kind: OutputHeadKind, dims: ScorerDims, vb: VarBuilder) -> Result<Self> {
        let l2r_proj = candle_nn::linear(dims.rnn_hidden, dims.tag_hidden, vb.pp("l2r_proj"))?;
        let r2l_proj =
            candle_nn::linear_no_bias(dims.rnn_hidden, dims.tag_hidden, vb.pp("r2l_proj"))?;
        let output = candle_nn::linear(dims.tag_hidden, dims.num_tags, vb.pp("output"))?;

        let head = match kind {
            OutputHeadKind::Softmax => Head::Softmax {
                // One extra row for the SOS-tag sentinel, which sits last.
                tag_embedding: candle_nn::embedding(
                    dims.num_tags + 1,
                    dims.tag_dim,
                    vb.pp("tag_embedding"),
                )?,
                tag_proj: candle_nn::linear_no_bias(
                    dims.tag_dim,
                    dims.tag_hidden,
                    vb.pp("tag_proj"),
                )?,
                sos_tag: dims.num_tags as u32,
            },
            OutputHeadKind::Crf => Head::Crf {
                transitions: vb.get_with_hints(
                    (dims.num_tags + 1, dims.num_tags),
                    "transitions",
                    Init::Const(0.0),
                )?,
            },
        };

        Ok(Self {
            l2r_proj,
            r2l_proj,
            output,
            head,
            num_tags: dims.num_tags,
        })
    }

    pub fn num_tags(&self) -> usize {
        self.num_tags
    }

    pub fn kind(&self) -> OutputHeadKind {
        match self.head {
            Head::Softmax { .. } => OutputHeadKind::Softmax,
            Head::Crf { .. } => OutputHeadKind::Crf,
        }
    }

    /// Score every position of an encoded sentence.
    ///
    /// For the softmax head, positions are scored in order and `source`
    /// decides which tag conditions the next one. The CRF head scores all
    /// positions at once and takes its argmax from Viterbi; `source` still
    /// sees every position so greedy callers collect that path.
    pub fn score<S: TagSource>(&self, encoded: &Encoded, source: &mut S) -> Result<Scored> {
        let n = encoded.len();
        let base = self
            .l2r_proj
            .forward(&encoded.l2r)?
            .add(&self.r2l_proj.forward(&encoded.r2l)?)?;

        match &self.head {
            Head::Softmax {
                tag_embedding,
                tag_proj,
                sos_tag,
            } => {
                let device = base.device();
                let mut rows = Vec::with_capacity(n);
                let mut best = Vec::with_capacity(n);
                let mut previous = *sos_tag;

                for position in 0..n {
                    let tag = tag_embedding.forward(&Tensor::new(&[previous], device)?)?;
                    let hidden = base
                        .narrow(0, position, 1)?
                        .add(&tag_proj.forward(&tag)?)?
                        .relu()?;
                    let scores = self.output.forward(&hidden)?;

                    let predicted = argmax(&scores.squeeze(0)?.to_vec1::<f32>()?);
                    best.push(predicted);
                    previous = source.advance(position, predicted);
                    rows.push(scores);
                }

                Ok(Scored {
                    logits: Tensor::cat(&rows, 0)?,
                    argmax: best,
                })
            }
            Head::Crf { transitions } => {
                let logits = self.output.forward(&base.relu()?)?;
                let path = self.viterbi(&logits, transitions)?;
                for (position, &tag) in path.iter().enumerate() {
                    source.advance(position, tag);
                }
                Ok(Scored {
                    logits,
                    argmax: path,
                })
            }
        }
    }

    /// Sentence loss against `gold`: summed cross-entropy for the softmax
    /// head, negative log-likelihood of the gold path for the CRF head.
    pub fn loss(&self, scored: &Scored, gold: &[u32]) -> Result<Tensor> {
        let device = scored.logits.device();
        let gold_ids = Tensor::new(gold, device)?.unsqueeze(1)?;

        match &self.head {
            Head::Softmax { .. } => {
                let log_probs = candle_nn::ops::log_softmax(&scored.logits, D::Minus1)?;
                log_probs.gather(&gold_ids, 1)?.sum_all()?.neg()
            }
            Head::Crf { transitions } => {
                let log_z = self.log_partition(&scored.logits, transitions)?;
                let gold_score = self.path_score(&scored.logits, transitions, gold, &gold_ids, device)?;
                log_z.sub(&gold_score)
            }
        }
    }

    /// Forward algorithm over `[n, T]` emissions.
    fn log_partition(&self, logits: &Tensor, transitions: &Tensor) -> Result<Tensor> {
        let t = self.num_tags;
        let start = transitions.narrow(0, t, 1)?.squeeze(0)?;
        let trans = transitions.narrow(0, 0, t)?;

        let mut alpha = start.add(&logits.get(0)?)?;
        for position in 1..logits.dim(0)? {
            let candidates = alpha.unsqueeze(1)?.broadcast_add(&trans)?;
            alpha = log_sum_exp(&candidates, 0)?.add(&logits.get(position)?)?;
        }
        log_sum_exp(&alpha, 0)
    }

    fn path_score(
        &self,
        logits: &Tensor,
        transitions: &Tensor,
        gold: &[u32],
        gold_ids: &Tensor,
        device: &Device,
    ) -> Result<Tensor> {
        let t = self.num_tags as u32;
        let emitted = logits.gather(gold_ids, 1)?.sum_all()?;

        let mut previous = t;
        let mut flat = Vec::with_capacity(gold.len());
        for &tag in gold {
            flat.push(previous * t + tag);
            previous = tag;
        }
        let flat = Tensor::new(flat.as_slice(), device)?;
        let moved = transitions.flatten_all()?.index_select(&flat, 0)?.sum_all()?;

        emitted.add(&moved)
    }

    fn viterbi(&self, logits: &Tensor, transitions: &Tensor) -> Result<Vec<u32>> {
        let t = self.num_tags;
        let emissions = logits.to_vec2::<f32>()?;
        let table = transitions.to_vec2::<f32>()?;
        let (trans, start) = table.split_at(t);

        crate::model::viterbi::ViterbiDecoder::new(t)
            .decode(&emissions, trans, &start[0])
            .map_err(candle_core::Error::wrap)
    }
}

/// Numerically stable log-sum-exp over `dim`, which is removed.
fn log_sum_exp(xs: &Tensor, dim: usize) -> Result<Tensor> {
    let max = xs.max_keepdim(dim)?;
    xs.broadcast_sub(&max)?
        .exp()?
        .sum_keepdim(dim)?
        .log()?
        .add(&max)?
        .squeeze(dim)
}
