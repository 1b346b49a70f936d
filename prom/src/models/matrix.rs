use serde::{Deserialize, Serialize};

/// Envelope of a `query_range` answer (`resultType == "matrix"`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixResponse {
    pub status: String,
    pub data:   MatrixData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixData {
    #[serde(rename = "resultType")]
    pub result_type: String,
    pub result:      Vec<MatrixResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixResult {
    pub metric: MatrixMetric,
    pub values: Vec<PromSample>,
}

/// Only the pod label is of interest; the orchestrator appends a
/// deployment hash and replica suffix to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixMetric {
    #[serde(default)]
    pub pod: String,
}

/// `[unix_seconds, "decimal value"]` pair, the value being string-encoded
/// by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromSample(pub f64, pub String);

#[cfg(test)]
mod tests {
    use super::*;

    const CPU: &str = r#"{"status":"success","data":{"resultType":"matrix","result":[{"metric":{"pod":"cows-74b8bd9675-wl6hd"},"values":[[1680708154,"19.103744"]]},{"metric":{"pod":"curl-644d87d8f7-lmdrj"},"values":[[1680708154,"3.780608"]]},{"metric":{"pod":"printer-6dd8ff9bfc-tpz47"},"values":[[1680708154,"7.028736"]]}]}}"#;

    const MEM: &str = r#"{"status":"success","data":{"resultType":"matrix","result":[{"metric":{"pod":"env-bb9765949-77t7k"},"values":[[1680706739,"0"]]},{"metric":{"pod":"shasum-5c9c4d9645-5cf5g"},"values":[[1680706739,"0.0005602004439362469"]]}]}}"#;

    #[test]
    fn parses_a_cpu_matrix() {
        let response: MatrixResponse = serde_json::from_str(CPU).unwrap();
        assert_eq!(response.status, "success");
        assert_eq!(response.data.result_type, "matrix");
        assert_eq!(response.data.result.len(), 3);

        let cows = &response.data.result[0];
        assert_eq!(cows.metric.pod, "cows-74b8bd9675-wl6hd");
        assert_eq!(cows.values[0].0, 1680708154.0);
        assert_eq!(cows.values[0].1, "19.103744");
    }

    #[test]
    fn parses_a_memory_matrix() {
        let response: MatrixResponse = serde_json::from_str(MEM).unwrap();
        assert_eq!(response.data.result.len(), 2);
        assert_eq!(response.data.result[1].values[0].1, "0.0005602004439362469");
    }

    #[test]
    fn missing_pod_label_defaults_to_empty() {
        let raw = r#"{"status":"success","data":{"resultType":"matrix","result":[{"metric":{},"values":[]}]}}"#;
        let response: MatrixResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.data.result[0].metric.pod, "");
    }
}
