#![cfg(feature = "backend-tract")]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use tract_onnx::prelude::*;

use crate::detect::backend::ClassifierBackend;
use crate::detect::decode::{decode_boxes, resize_to_chw, LOCAL_CONFIDENCE_FLOOR};
use crate::detect::lazy::LazyModel;
use crate::detect::result::Detection;
use crate::frame::Frame;

type Plan = TypedRunnableModel<TypedModel>;

#[derive(Clone, Debug)]
pub struct LocalModelConfig {
    pub model_path: PathBuf,
    pub input_width: u32,
    pub input_height: u32,
    pub labels: Vec<String>,
    pub retry_after: Duration,
}

/// Tract-based backend for a local ONNX detection model.
///
/// The model is loaded on the first `detect` call and cached. It must produce
/// two outputs: boxes `[1, N, 4]` with normalized corners and class scores
/// `[1, N, C]`. Until the model loads, the backend reports no detections.
pub struct TractBackend {
    config: LocalModelConfig,
    model: LazyModel<Arc<Plan>>,
}

impl TractBackend {
    pub fn new(config: LocalModelConfig) -> Self {
        let model = LazyModel::new("local").with_retry(config.retry_after);
        Self { config, model }
    }

    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        let (w, h) = (self.config.input_width, self.config.input_height);
        let data = resize_to_chw(frame, w, h);
        let input = tract_ndarray::Array4::from_shape_vec((1, 3, h as usize, w as usize), data)
            .context("failed to shape model input")?;
        Ok(input.into_tensor())
    }
}

fn load_plan(model_path: &Path, width: u32, height: u32) -> Result<Plan> {
    let plan = tract_onnx::onnx()
        .model_for_path(model_path)
        .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
        .with_input_fact(
            0,
            InferenceFact::dt_shape(
                f32::datum_type(),
                tvec!(1, 3, height as usize, width as usize),
            ),
        )
        .context("failed to set input fact")?
        .into_optimized()
        .context("failed to optimize ONNX model")?
        .into_runnable()
        .context("failed to build runnable ONNX model")?;
    Ok(plan)
}

#[async_trait]
impl ClassifierBackend for TractBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    fn is_ready(&self) -> bool {
        self.model.is_loaded()
    }

    fn reload(&mut self) -> Result<()> {
        self.model.reset();
        Ok(())
    }

    async fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let input = self.build_input(frame)?;
        let config = &self.config;
        let Some(plan) = self.model.get_or_load(|| {
            load_plan(&config.model_path, config.input_width, config.input_height).map(Arc::new)
        }) else {
            return Ok(Vec::new());
        };
        let plan = Arc::clone(plan);

        let (boxes, scores) = tokio::task::spawn_blocking(move || -> Result<_> {
            let outputs = plan.run(tvec!(input.into())).context("ONNX inference failed")?;
            let boxes = outputs
                .first()
                .ok_or_else(|| anyhow!("model produced no box output"))?
                .as_slice::<f32>()
                .context("box tensor was not f32")?
                .to_vec();
            let scores = outputs
                .get(1)
                .ok_or_else(|| anyhow!("model produced no score output"))?
                .as_slice::<f32>()
                .context("score tensor was not f32")?
                .to_vec();
            Ok((boxes, scores))
        })
        .await
        .context("local model task panicked")??;

        decode_boxes(
            &boxes,
            &scores,
            &self.config.labels,
            frame.size(),
            LOCAL_CONFIDENCE_FLOOR,
        )
    }
}
