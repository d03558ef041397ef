use anyhow::{Context, Result};
use reqwest::Client;
use shared::model::ModelMetadata;

fn is_http(locator: &str) -> bool {
    locator.starts_with("http://") || locator.starts_with("https://")
}

/// Reads a model's JSON settings from an `http(s)` URL or a local path.
pub async fn fetch_metadata(http: &Client, locator: &str) -> Result<ModelMetadata> {
    if is_http(locator) {
        let res = http
            .get(locator)
            .send()
            .await
            .with_context(|| format!("failed to fetch model metadata: {locator}"))?
            .error_for_status()?;
        let metadata = res
            .json::<ModelMetadata>()
            .await
            .with_context(|| format!("model metadata is not valid JSON: {locator}"))?;
        return Ok(metadata);
    }

    let raw = tokio::fs::read_to_string(locator)
        .await
        .with_context(|| format!("failed to read model metadata: {locator}"))?;
    serde_json::from_str(&raw).with_context(|| format!("model metadata is not valid JSON: {locator}"))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[tokio::test]
    async fn reads_metadata_from_local_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{"Version":3,"FileReferences":{{"Expressions":[{{"Name":"smile"}}]}}}}"#
        )
        .expect("write");

        let metadata = fetch_metadata(&Client::new(), &file.path().to_string_lossy())
            .await
            .expect("metadata");
        assert_eq!(metadata.expression_names(), vec!["smile"]);
    }

    #[tokio::test]
    async fn missing_file_reports_locator() {
        let err = fetch_metadata(&Client::new(), "/definitely/not/here.model3.json")
            .await
            .expect_err("must fail");
        assert!(err.to_string().contains("/definitely/not/here.model3.json"));
    }
}
