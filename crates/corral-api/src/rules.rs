//! Rules API endpoints.
//!
//! CRUD over persisted correlation rules plus the generation dispatch.
//! All methods are inherent methods on [`ApiClient`].

use tracing::{debug, instrument};

use crate::client::ApiClient;
use crate::error::Error;
use crate::models::{GenerationTask, RuleCreateBody, RuleRecord};

impl ApiClient {
    /// Fetch all persisted correlation rules.
    #[instrument(skip(self))]
    pub async fn list_rules(&self) -> Result<Vec<RuleRecord>, Error> {
        self.get(self.api_url("rules")).await
    }

    /// Persist a new correlation rule.
    #[instrument(skip(self, body), fields(rule = %body.rule_name))]
    pub async fn create_rule(&self, body: &RuleCreateBody) -> Result<RuleRecord, Error> {
        self.post(self.api_url("rules"), body).await
    }

    /// Update an existing rule in place.
    #[instrument(skip(self, body), fields(rule = %body.rule_name))]
    pub async fn update_rule(
        &self,
        rule_id: &str,
        body: &RuleCreateBody,
    ) -> Result<RuleRecord, Error> {
        self.put(self.api_url(&format!("rules/{rule_id}")), body)
            .await
    }

    /// Delete a rule by id.
    #[instrument(skip(self))]
    pub async fn delete_rule(&self, rule_id: &str) -> Result<(), Error> {
        self.delete(self.api_url(&format!("rules/{rule_id}"))).await
    }

    /// Start a server-side rule-generation run.
    ///
    /// Returns the task id correlating this dispatch to the eventual
    /// push-channel result. A response without a usable task id fails
    /// fast with [`Error::MissingTaskId`] -- callers must never end up
    /// subscribed to an undefined channel name.
    #[instrument(skip(self))]
    pub async fn trigger_generation(&self) -> Result<GenerationTask, Error> {
        let task: GenerationTask = self.get(self.api_url("rules/gen_rules")).await?;

        if task.task_id.is_empty() {
            return Err(Error::MissingTaskId);
        }

        debug!(task_id = %task.task_id, "generation dispatched");
        Ok(task)
    }

    /// Start a generation run without consuming the response.
    ///
    /// The shared-channel flow only needs to prompt the backend; whatever
    /// results come of it arrive later through the shared push channel.
    #[instrument(skip(self))]
    pub async fn trigger_generation_detached(&self) -> Result<(), Error> {
        let _: serde_json::Value = self.get(self.api_url("rules/gen_rules")).await?;
        Ok(())
    }
}
