//! Registry endpoints
//!
//! Push builds, execution units and step logs into a server running the
//! in-memory registry.

use buildlog_core::domain::build::Build;
use buildlog_core::domain::unit::ExecutionUnit;

use crate::BuildLogClient;
use crate::error::Result;

impl BuildLogClient {
    /// Create or replace a build
    ///
    /// # Returns
    /// The stored build, with the resource version assigned by the server
    pub async fn put_build(&self, build: &Build) -> Result<Build> {
        let url = format!(
            "{}/namespaces/{}/builds/{}",
            self.base_url, build.namespace, build.name
        );
        let response = self.client.put(&url).json(build).send().await?;

        self.handle_response(response).await
    }

    /// Create or replace an execution unit
    pub async fn put_unit(&self, unit: &ExecutionUnit) -> Result<ExecutionUnit> {
        let url = format!(
            "{}/namespaces/{}/units/{}",
            self.base_url, unit.namespace, unit.name
        );
        let response = self.client.put(&url).json(unit).send().await?;

        self.handle_response(response).await
    }

    /// Append raw output to the log of a step
    ///
    /// Only accepted by servers using the memory log backend.
    pub async fn append_step_log(
        &self,
        namespace: &str,
        unit: &str,
        step: &str,
        bytes: Vec<u8>,
    ) -> Result<()> {
        let url = format!(
            "{}/namespaces/{}/units/{}/steps/{}/log",
            self.base_url, namespace, unit, step
        );
        let response = self.client.post(&url).body(bytes).send().await?;

        self.handle_empty_response(response).await
    }
}
