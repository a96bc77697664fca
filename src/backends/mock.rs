//! Mock backend implementation for testing and debugging

use crate::{
    config::ModelType,
    error::{BgRemovalError, Result},
    inference::{EncodedImage, InferenceConfig, SegmentationBackend, SegmentationOutput},
    types::{MaskPolarity, SegmentationMask},
};
use async_trait::async_trait;
use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
    time::Duration,
};

/// What the mock returns from `segment`
#[derive(Debug, Clone)]
enum MockResponse {
    /// Luminance of the input image as foreground score
    Luminance,
    /// A fixed mask
    Fixed(SegmentationMask),
    /// An empty result list
    Empty,
    /// One result without a mask
    Maskless,
}

/// Mock segmentation backend for testing and debugging purposes
///
/// By default the mask is the luminance of the input image, so bright
/// regions count as foreground. Failures and delays can be configured per
/// model, and every call is recorded.
#[derive(Debug)]
pub struct MockBackend {
    response: MockResponse,
    polarity: MaskPolarity,
    failing_models: HashSet<ModelType>,
    failing_loads: HashSet<ModelType>,
    delay: Option<Duration>,
    slow_models: HashMap<ModelType, Duration>,
    load_calls: Mutex<Vec<ModelType>>,
    segment_calls: Mutex<Vec<ModelType>>,
}

impl MockBackend {
    /// Create a new luminance based mock backend
    #[must_use]
    pub fn new() -> Self {
        Self::from_response(MockResponse::Luminance)
    }

    /// Mock that always returns `mask`
    #[must_use]
    pub fn with_mask(mask: SegmentationMask) -> Self {
        Self::from_response(MockResponse::Fixed(mask))
    }

    /// Mock that returns an empty result list
    #[must_use]
    pub fn empty_results() -> Self {
        Self::from_response(MockResponse::Empty)
    }

    /// Mock whose only result carries no mask
    #[must_use]
    pub fn maskless() -> Self {
        Self::from_response(MockResponse::Maskless)
    }

    fn from_response(response: MockResponse) -> Self {
        Self {
            response,
            polarity: MaskPolarity::Foreground,
            failing_models: HashSet::new(),
            failing_loads: HashSet::new(),
            delay: None,
            slow_models: HashMap::new(),
            load_calls: Mutex::new(Vec::new()),
            segment_calls: Mutex::new(Vec::new()),
        }
    }

    /// Report masks with the given polarity
    #[must_use]
    pub fn polarity(mut self, polarity: MaskPolarity) -> Self {
        self.polarity = polarity;
        self
    }

    /// Make `segment` fail for `model`
    #[must_use]
    pub fn failing_model(mut self, model: ModelType) -> Self {
        self.failing_models.insert(model);
        self
    }

    /// Make `load_model` fail for `model`
    #[must_use]
    pub fn failing_load(mut self, model: ModelType) -> Self {
        self.failing_loads.insert(model);
        self
    }

    /// Sleep before answering `segment`
    #[must_use]
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sleep before answering `segment` for `model` only
    #[must_use]
    pub fn slow_model(mut self, model: ModelType, delay: Duration) -> Self {
        self.slow_models.insert(model, delay);
        self
    }

    /// Models passed to `load_model`, in call order
    #[must_use]
    pub fn load_calls(&self) -> Vec<ModelType> {
        self.load_calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    /// Models passed to `segment`, in call order
    #[must_use]
    pub fn segment_calls(&self) -> Vec<ModelType> {
        self.segment_calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    fn record(calls: &Mutex<Vec<ModelType>>, model: ModelType) {
        if let Ok(mut calls) = calls.lock() {
            calls.push(model);
        }
    }

    fn luminance_mask(image: &EncodedImage) -> Result<SegmentationMask> {
        let raster = image
            .decode()
            .map_err(|e| BgRemovalError::inference(format!("Mock backend cannot read input: {}", e)))?;
        let gray = image::imageops::grayscale(raster.as_image());
        SegmentationMask::from_gray(&gray)
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SegmentationBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn load_model(&self, model: ModelType, _config: &InferenceConfig) -> Result<()> {
        Self::record(&self.load_calls, model);

        if self.failing_loads.contains(&model) {
            return Err(BgRemovalError::inference_with_model(
                model.identifier(),
                "Model loading",
                "mock load failure",
            ));
        }
        Ok(())
    }

    async fn segment(&self, image: &EncodedImage, model: ModelType) -> Result<Vec<SegmentationOutput>> {
        Self::record(&self.segment_calls, model);

        if let Some(delay) = self.slow_models.get(&model).copied().or(self.delay) {
            tokio::time::sleep(delay).await;
        }

        if self.failing_models.contains(&model) {
            return Err(BgRemovalError::inference_with_model(
                model.identifier(),
                "Segmentation",
                "Segmentation failed",
            ));
        }

        let output = match &self.response {
            MockResponse::Luminance => SegmentationOutput::new(Self::luminance_mask(image)?),
            MockResponse::Fixed(mask) => SegmentationOutput::new(mask.clone()),
            MockResponse::Empty => return Ok(Vec::new()),
            MockResponse::Maskless => SegmentationOutput::empty(),
        };

        Ok(vec![output
            .with_label("foreground")
            .with_score(1.0)
            .with_polarity(self.polarity)])
    }
}
