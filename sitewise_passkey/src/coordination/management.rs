use super::service::PasskeyService;
use crate::passkey::{
    PasskeyCredential, PasskeyError, PasskeySummary, sanitize_device_name, validate_device_name,
};

impl PasskeyService {
    /// The user's passkeys, most recently used first.
    pub async fn list_credentials(&self, user_id: &str) -> Vec<PasskeySummary> {
        self.credentials
            .list_by_user(user_id)
            .await
            .iter()
            .map(PasskeySummary::from)
            .collect()
    }

    pub async fn rename_credential(
        &self,
        user_id: &str,
        credential_id: &str,
        device_name: &str,
    ) -> Result<PasskeySummary, PasskeyError> {
        if device_name.trim().is_empty() {
            return Err(PasskeyError::InvalidRequest("Device name must not be empty".into()).log());
        }
        validate_device_name(device_name).map_err(PasskeyError::log)?;
        let name = sanitize_device_name(Some(device_name));

        let mut credential = self.owned_credential(user_id, credential_id).await?;
        if !self
            .credentials
            .rename(credential_id, &name)
            .await
            .map_err(PasskeyError::log)?
        {
            return Err(PasskeyError::NotFound("Passkey not found".into()).log());
        }
        credential.device_name = name;

        tracing::info!(
            event = "passkey_renamed",
            user_id,
            credential_id,
            "Passkey renamed"
        );

        Ok(PasskeySummary::from(&credential))
    }

    pub async fn delete_credential(
        &self,
        user_id: &str,
        credential_id: &str,
    ) -> Result<(), PasskeyError> {
        self.owned_credential(user_id, credential_id).await?;
        if !self
            .credentials
            .delete(credential_id)
            .await
            .map_err(PasskeyError::log)?
        {
            return Err(PasskeyError::NotFound("Passkey not found".into()).log());
        }

        tracing::info!(
            event = "passkey_deleted",
            user_id,
            credential_id,
            "Passkey deleted"
        );

        Ok(())
    }

    async fn owned_credential(
        &self,
        user_id: &str,
        credential_id: &str,
    ) -> Result<PasskeyCredential, PasskeyError> {
        let credential = self
            .credentials
            .find_by_id(credential_id)
            .await
            .ok_or_else(|| PasskeyError::NotFound("Passkey not found".into()).log())?;

        if credential.user_id != user_id {
            tracing::warn!(
                event = "passkey_ownership_violation",
                user_id,
                credential_id,
                "Attempt to modify another user's passkey"
            );
            return Err(PasskeyError::Unauthorized);
        }

        Ok(credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{LogCapture, TestHarness};
    use chrono::Duration;

    #[tokio::test]
    async fn test_list_credentials_most_recent_first() {
        // Given two passkeys where the older one was used last
        let harness = TestHarness::new();
        harness.register_credential("u1", "cred-1", 0).await;
        harness.clock.advance(Duration::minutes(1));
        harness.register_credential("u1", "cred-2", 0).await;
        harness.register_credential("u2", "cred-3", 0).await;
        harness.clock.advance(Duration::minutes(1));
        harness
            .service
            .credentials()
            .record_successful_use("cred-1", 1)
            .await
            .unwrap();

        // When u1 lists them
        let list = harness.service.list_credentials("u1").await;

        // Then only u1's passkeys come back, ordered by last use
        let ids: Vec<_> = list.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["cred-1", "cred-2"]);
    }

    #[tokio::test]
    async fn test_list_credentials_empty() {
        let harness = TestHarness::new();
        assert!(harness.service.list_credentials("nobody").await.is_empty());
    }

    #[tokio::test]
    async fn test_rename_credential() {
        let harness = TestHarness::new();
        harness.register_credential("u1", "cred-1", 0).await;

        let summary = harness
            .service
            .rename_credential("u1", "cred-1", "  Work Laptop  ")
            .await
            .unwrap();

        assert_eq!(summary.device_name, "Work Laptop");
        let stored = harness.service.credentials().find_by_id("cred-1").await.unwrap();
        assert_eq!(stored.device_name, "Work Laptop");
    }

    #[tokio::test]
    async fn test_rename_rejects_invalid_name() {
        let harness = TestHarness::new();
        harness.register_credential("u1", "cred-1", 0).await;

        for name in ["", "   ", "<script>", &"x".repeat(101)] {
            let result = harness.service.rename_credential("u1", "cred-1", name).await;
            assert!(
                matches!(result, Err(PasskeyError::InvalidRequest(_))),
                "{name:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_rename_other_users_credential() {
        // Given a passkey owned by u1
        let harness = TestHarness::new();
        harness.register_credential("u1", "cred-1", 0).await;

        // When u2 tries to rename it
        let result = harness
            .service
            .rename_credential("u2", "cred-1", "Mine now")
            .await;

        // Then it is refused and the name is unchanged
        assert_eq!(result, Err(PasskeyError::Unauthorized));
        let stored = harness.service.credentials().find_by_id("cred-1").await.unwrap();
        assert_ne!(stored.device_name, "Mine now");
    }

    #[tokio::test]
    async fn test_rename_unknown_credential() {
        let harness = TestHarness::new();

        let result = harness
            .service
            .rename_credential("u1", "missing", "Phone")
            .await;

        assert!(matches!(result, Err(PasskeyError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_management_errors_are_logged() {
        // Given a subscriber capturing log output
        let (logs, _guard) = LogCapture::install();
        let harness = TestHarness::new();

        // When a rename targets a missing passkey and another uses a blank name
        let missing = harness.service.rename_credential("u1", "missing", "Phone").await;
        let blank = harness.service.rename_credential("u1", "missing", " ").await;

        // Then both failures are returned and recorded
        assert!(matches!(missing, Err(PasskeyError::NotFound(_))));
        assert!(matches!(blank, Err(PasskeyError::InvalidRequest(_))));
        let output = logs.contents();
        assert!(output.contains("Not found: Passkey not found"), "{output}");
        assert!(output.contains("Invalid request: Device name must not be empty"), "{output}");
    }

    #[tokio::test]
    async fn test_delete_credential() {
        let harness = TestHarness::new();
        harness.register_credential("u1", "cred-1", 0).await;

        harness
            .service
            .delete_credential("u1", "cred-1")
            .await
            .unwrap();

        assert!(harness.credentials.is_empty().await);
        assert!(matches!(
            harness.service.delete_credential("u1", "cred-1").await,
            Err(PasskeyError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_other_users_credential() {
        let harness = TestHarness::new();
        harness.register_credential("u1", "cred-1", 0).await;

        let result = harness.service.delete_credential("u2", "cred-1").await;

        assert_eq!(result, Err(PasskeyError::Unauthorized));
        assert_eq!(harness.credentials.len().await, 1);
    }
}
