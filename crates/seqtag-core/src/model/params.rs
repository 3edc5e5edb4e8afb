//! Parameter initialization and value snapshots of a [`VarMap`].

use std::collections::BTreeMap;

use candle_core::{Tensor, Var};
use candle_nn::VarMap;

use crate::context::Context;
use crate::error::{Result, TaggerError};

/// Owned copy of every named parameter. Later updates to the live model
/// never show through.
#[derive(Debug, Clone)]
pub struct ParamSnapshot {
    tensors: BTreeMap<String, Tensor>,
}

impl ParamSnapshot {
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.tensors.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tensor)> {
        self.tensors.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Named variables sorted by name, so iteration order is stable.
pub(crate) fn sorted_vars(varmap: &VarMap) -> Result<Vec<(String, Var)>> {
    let data = varmap
        .data()
        .lock()
        .map_err(|_| TaggerError::InvalidModel("parameter table lock poisoned".into()))?;
    let mut vars: Vec<(String, Var)> = data.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    vars.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(vars)
}

/// A tensor with its own storage and no gradient history.
fn deep_copy(tensor: &Tensor) -> Result<Tensor> {
    let values = tensor.flatten_all()?.to_vec1::<f32>()?;
    Ok(Tensor::from_vec(values, tensor.dims().to_vec(), tensor.device())?)
}

pub(crate) fn snapshot(varmap: &VarMap) -> Result<ParamSnapshot> {
    let mut tensors = BTreeMap::new();
    for (name, var) in sorted_vars(varmap)? {
        tensors.insert(name, deep_copy(var.as_tensor())?);
    }
    Ok(ParamSnapshot { tensors })
}

/// Copy `snapshot` into the live variables. Every variable must be present
/// with an identical shape.
pub(crate) fn restore(varmap: &VarMap, snapshot: &ParamSnapshot) -> Result<()> {
    let vars = sorted_vars(varmap)?;
    if vars.len() != snapshot.len() {
        return Err(TaggerError::DimensionMismatch {
            what: "parameter count".into(),
            expected: vars.len(),
            found: snapshot.len(),
        });
    }
    for (name, var) in vars {
        let tensor = snapshot
            .get(&name)
            .ok_or_else(|| TaggerError::InvalidModel(format!("missing parameter {name}")))?;
        assign(&name, &var, tensor)?;
    }
    Ok(())
}

/// Overwrite one variable after checking shapes.
pub(crate) fn assign(name: &str, var: &Var, tensor: &Tensor) -> Result<()> {
    if var.dims() != tensor.dims() {
        return Err(TaggerError::InvalidModel(format!(
            "parameter {name} has shape {:?}, stored tensor has {:?}",
            var.dims(),
            tensor.dims()
        )));
    }
    var.set(&tensor.to_dtype(var.dtype())?)?;
    Ok(())
}

/// Re-draw every parameter from `ctx`: Glorot-uniform for matrices, zero for
/// vectors.
pub(crate) fn initialize(varmap: &VarMap, ctx: &mut Context) -> Result<()> {
    for (_, var) in sorted_vars(varmap)? {
        let dims = var.dims().to_vec();
        let values = match dims.as_slice() {
            [rows, cols] => {
                let bound = (6.0 / (rows + cols) as f32).sqrt();
                ctx.symmetric_uniform(rows * cols, bound)
            }
            _ => vec![0.0; dims.iter().product()],
        };
        var.set(&Tensor::from_vec(values, dims, var.device())?)?;
    }
    Ok(())
}
