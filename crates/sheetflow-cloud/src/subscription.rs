//! Subscription validation

use crate::azure::AzureApi;
use crate::error::{CloudError, Result};
use serde::Serialize;
use tracing::{debug, info};

/// The subscription a run deploys into
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionContext {
    pub subscription_id: String,
    pub tenant_id: String,
    pub name: String,
}

/// Find the subscription whose display name is exactly `name`.
///
/// The list is fetched from Azure on every call. Matching is case-sensitive.
pub async fn validate_subscription(
    azure: &dyn AzureApi,
    name: &str,
) -> Result<SubscriptionContext> {
    let subscriptions = azure.list_subscriptions().await?;
    debug!(count = subscriptions.len(), "Visible subscriptions");

    let subscription = subscriptions
        .into_iter()
        .find(|s| s.display_name == name)
        .ok_or_else(|| CloudError::SubscriptionNotFound(name.to_string()))?;

    info!(
        subscription = %subscription.display_name,
        id = %subscription.subscription_id,
        "Subscription validated"
    );

    Ok(SubscriptionContext {
        subscription_id: subscription.subscription_id,
        tenant_id: subscription.tenant_id,
        name: subscription.display_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeAzure, SUBSCRIPTION_ID, TENANT_ID};

    #[tokio::test]
    async fn test_exact_match() {
        let azure = FakeAzure::new().with_subscription("Acme Production");
        let ctx = validate_subscription(&azure, "Acme Production").await.unwrap();

        assert_eq!(ctx.subscription_id, SUBSCRIPTION_ID);
        assert_eq!(ctx.tenant_id, TENANT_ID);
        assert_eq!(ctx.name, "Acme Production");
    }

    #[tokio::test]
    async fn test_match_is_case_sensitive() {
        let azure = FakeAzure::new().with_subscription("Acme Production");
        let result = validate_subscription(&azure, "acme production").await;

        assert!(matches!(result, Err(CloudError::SubscriptionNotFound(name)) if name == "acme production"));
        assert_eq!(azure.calls(), vec!["list_subscriptions"]);
    }

    #[tokio::test]
    async fn test_authentication_failure_propagates() {
        let azure = FakeAzure::new().with_subscription("Acme").failing_auth();
        let result = validate_subscription(&azure, "Acme").await;
        assert!(matches!(result, Err(CloudError::AuthenticationFailed(_))));
    }
}
