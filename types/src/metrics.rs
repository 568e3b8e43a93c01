/// Metrics received from a Pipecat instance.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PipecatMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    processing: Option<Vec<PipecatMetricsData>>,
    /// Time to first byte, per processor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ttfb: Option<Vec<PipecatMetricsData>>,
}

impl PipecatMetrics {
    pub fn new(
        processing: Option<Vec<PipecatMetricsData>>,
        ttfb: Option<Vec<PipecatMetricsData>>,
    ) -> Self {
        Self { processing, ttfb }
    }

    pub fn processing(&self) -> &[PipecatMetricsData] {
        self.processing.as_deref().unwrap_or_default()
    }

    pub fn ttfb(&self) -> &[PipecatMetricsData] {
        self.ttfb.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PipecatMetricsData {
    processor: String,
    value: f64,
}

impl PipecatMetricsData {
    pub fn new(processor: &str, value: f64) -> Self {
        Self {
            processor: processor.to_string(),
            value,
        }
    }

    pub fn processor(&self) -> &str {
        &self.processor
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}
