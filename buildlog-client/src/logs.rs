//! Build log streaming

use buildlog_core::dto::log::BuildLogOptions;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream::BoxStream;

use crate::BuildLogClient;
use crate::error::{ClientError, Result};

/// Chunks of a build log as they arrive
pub type LogChunks = BoxStream<'static, Result<Bytes>>;

impl BuildLogClient {
    /// Open the aggregated log of a build
    ///
    /// Errors the server detects before streaming (unknown build, invalid
    /// options, start timeout) are returned here. A stream cut short by the
    /// server ends with an `unable to stream build logs: ...` line instead.
    pub async fn stream_build_log(
        &self,
        namespace: &str,
        name: &str,
        options: &BuildLogOptions,
    ) -> Result<LogChunks> {
        let request = self.build_log_request(namespace, name, options)?;
        tracing::debug!("Requesting {}", request.url());

        let response = self.client.execute(request).await?;
        let response = self.check_status(response).await?;

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(ClientError::from))
            .boxed())
    }

    /// Read the whole log of a build into memory
    ///
    /// Meant for finished builds; with `follow` this returns only once the
    /// build stops producing output.
    pub async fn get_build_log(
        &self,
        namespace: &str,
        name: &str,
        options: &BuildLogOptions,
    ) -> Result<Vec<u8>> {
        let mut chunks = self.stream_build_log(namespace, name, options).await?;
        let mut log = Vec::new();
        while let Some(chunk) = chunks.next().await {
            log.extend_from_slice(&chunk?);
        }
        Ok(log)
    }

    fn build_log_request(
        &self,
        namespace: &str,
        name: &str,
        options: &BuildLogOptions,
    ) -> Result<reqwest::Request> {
        let url = format!(
            "{}/namespaces/{}/builds/{}/log",
            self.base_url, namespace, name
        );

        Ok(self.client.get(&url).query(options).build()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_query() {
        let client = BuildLogClient::new("http://localhost:8080/");
        let request = client
            .build_log_request("ci", "app-1", &BuildLogOptions::default())
            .unwrap();

        assert_eq!(request.url().path(), "/namespaces/ci/builds/app-1/log");
        let query = request.url().query().unwrap_or_default();
        assert!(query.contains("follow=false"));
        assert!(!query.contains("tailLines"));
    }

    #[test]
    fn test_options_use_camel_case_keys() {
        let client = BuildLogClient::new("http://localhost:8080");
        let options = BuildLogOptions {
            follow: true,
            no_wait: true,
            container: Some("sidecar".into()),
            tail_lines: Some(50),
            ..Default::default()
        };

        let request = client.build_log_request("ci", "app-1", &options).unwrap();
        let query = request.url().query().unwrap();

        assert!(query.contains("follow=true"));
        assert!(query.contains("noWait=true"));
        assert!(query.contains("container=sidecar"));
        assert!(query.contains("tailLines=50"));
    }
}
