use std::collections::HashMap;
use std::sync::Arc;

use reengage_core::types::{segment_resource_arn, REENGAGEMENT_TAG_KEY, REENGAGEMENT_TAG_VALUE};
use reengage_core::{ReengageResult, SegmentService};
use tracing::info;

/// Marks a segment as the re-engagement target.
pub struct SegmentTagger {
    service: Arc<dyn SegmentService>,
    region: String,
    application_id: String,
}

impl SegmentTagger {
    pub fn new(
        service: Arc<dyn SegmentService>,
        region: impl Into<String>,
        application_id: impl Into<String>,
    ) -> Self {
        Self {
            service,
            region: region.into(),
            application_id: application_id.into(),
        }
    }

    pub fn resource_arn(&self, external_id: &str, segment_id: &str) -> String {
        segment_resource_arn(&self.region, external_id, &self.application_id, segment_id)
    }

    /// Apply `REENGAGEMENT=YES`. Re-applying is a no-op for the tag set.
    pub async fn apply(&self, external_id: &str, segment_id: &str) -> ReengageResult<()> {
        let arn = self.resource_arn(external_id, segment_id);
        let mut tags = HashMap::new();
        tags.insert(
            REENGAGEMENT_TAG_KEY.to_string(),
            REENGAGEMENT_TAG_VALUE.to_string(),
        );

        self.service.tag_resource(&arn, tags).await?;

        metrics::counter!("workflow.segments_tagged").increment(1);
        info!(resource_arn = %arn, "segment tagged for re-engagement");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reengage_connectors::InMemorySegmentService;
    use reengage_core::types::{Segment, SegmentType};

    fn setup() -> (Arc<InMemorySegmentService>, SegmentTagger) {
        let service = Arc::new(InMemorySegmentService::new(
            "us-east-1".to_string(),
            "ext1".to_string(),
            0,
        ));
        service.add_segment(
            "app",
            Segment {
                id: "s1".to_string(),
                name: "UnEngaged Users".to_string(),
                external_id: Some("ext1".to_string()),
                segment_type: SegmentType::Import,
                tags: HashMap::new(),
            },
        );
        let tagger = SegmentTagger::new(service.clone(), "us-east-1", "app");
        (service, tagger)
    }

    #[test]
    fn test_resource_arn() {
        let (_, tagger) = setup();
        assert_eq!(
            tagger.resource_arn("ext1", "s1"),
            "arn:aws:mobiletargeting:us-east-1:ext1:apps/app/segments/s1"
        );
    }

    #[tokio::test]
    async fn test_apply_is_idempotent() {
        let (service, tagger) = setup();

        tagger.apply("ext1", "s1").await.unwrap();
        let once = service.segment("app", "s1").unwrap().tags;
        tagger.apply("ext1", "s1").await.unwrap();
        let twice = service.segment("app", "s1").unwrap().tags;

        assert_eq!(once, twice);
        assert_eq!(twice.get("REENGAGEMENT").map(String::as_str), Some("YES"));
        assert!(service.segment("app", "s1").unwrap().is_reengagement_import());
    }

    #[tokio::test]
    async fn test_unknown_segment_fails() {
        let (_, tagger) = setup();
        let err = tagger.apply("ext1", "missing").await.unwrap_err();
        assert!(err.is_service());
    }
}
