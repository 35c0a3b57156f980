use crate::classify::parse_mirror_reference;
use crate::error::Result;
use crate::traits::Probe;
use crate::types::{CheckResult, MirrorCheck, MirrorRegistry};
use tracing::{debug, warn};

/// Expand `mirror://<id>/<path>` against the registry and probe every base.
///
/// An unknown mirror id is an ordinary (unavailable) result, not an error.
pub async fn resolve_mirror(
    probe: &dyn Probe,
    mirror_url: &str,
    registry: &MirrorRegistry,
) -> Result<CheckResult> {
    let reference = parse_mirror_reference(mirror_url)?;

    let Some(definition) = registry.get(&reference.id) else {
        warn!(mirror = %reference.id, "mirror not defined");
        return Ok(CheckResult::Mirror(MirrorCheck {
            error: Some(format!("mirror '{}' not defined", reference.id)),
            mirror: reference.id,
            path: reference.path,
            available: false,
            entries: Vec::new(),
        }));
    };

    let targets: Vec<String> = definition
        .urls
        .iter()
        .map(|base| reference.join(base))
        .collect();
    debug!(mirror = %reference.id, candidates = targets.len(), "expanded mirror");

    // join_all keeps the base-URL order no matter which probe finishes first
    let tasks = targets.iter().map(|url| probe.probe(url));
    let entries = futures::future::join_all(tasks)
        .await
        .into_iter()
        .collect::<Result<Vec<_>>>()?;

    Ok(CheckResult::Mirror(MirrorCheck {
        available: entries.iter().any(|e| e.available),
        mirror: reference.id,
        path: reference.path,
        error: None,
        entries,
    }))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::CheckerError;
    use crate::types::{MirrorDefinition, ProbeResult};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Records every URL it is asked about; URLs in `up` are available.
    #[derive(Default)]
    pub struct RecordingProbe {
        pub calls: Mutex<Vec<String>>,
        pub up: HashSet<String>,
    }

    impl RecordingProbe {
        pub fn with_up(urls: &[&str]) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                up: urls.iter().map(|u| u.to_string()).collect(),
            }
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Probe for RecordingProbe {
        async fn probe(&self, url: &str) -> Result<ProbeResult> {
            self.calls.lock().unwrap().push(url.to_string());
            if self.up.contains(url) {
                Ok(ProbeResult {
                    url: url.to_string(),
                    available: true,
                    status_code: Some(200),
                    error: None,
                    latency_ms: Some(1),
                })
            } else {
                Ok(ProbeResult::failed(url, "connection refused"))
            }
        }
    }

    fn openbsd_registry() -> MirrorRegistry {
        [MirrorDefinition::new(
            "openbsd",
            &["https://a.example/", "https://b.example"],
        )]
        .into_iter()
        .collect()
    }

    const INSTALL_IMG: &str = "mirror://openbsd/OpenBSD/7.5/riscv64/install75.img";

    #[tokio::test]
    async fn test_probes_every_base_in_order() -> Result<()> {
        let probe = RecordingProbe::with_up(&["https://b.example/OpenBSD/7.5/riscv64/install75.img"]);

        let result = resolve_mirror(&probe, INSTALL_IMG, &openbsd_registry()).await?;

        let expected = vec![
            "https://a.example/OpenBSD/7.5/riscv64/install75.img".to_string(),
            "https://b.example/OpenBSD/7.5/riscv64/install75.img".to_string(),
        ];
        assert_eq!(probe.calls(), expected);

        let CheckResult::Mirror(check) = result else {
            panic!("expected a mirror result");
        };
        assert_eq!(check.mirror, "openbsd");
        assert_eq!(check.path, "OpenBSD/7.5/riscv64/install75.img");
        assert_eq!(
            check.entries.iter().map(|e| e.url.clone()).collect::<Vec<_>>(),
            expected
        );
        assert!(!check.entries[0].available);
        assert!(check.entries[1].available);
        assert!(check.available);
        assert_eq!(check.error, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_all_entries_down_is_unavailable() -> Result<()> {
        let probe = RecordingProbe::default();

        let result = resolve_mirror(&probe, INSTALL_IMG, &openbsd_registry()).await?;

        assert!(!result.available());
        Ok(())
    }

    #[tokio::test]
    async fn test_mirror_without_urls_is_unavailable() -> Result<()> {
        let probe = RecordingProbe::default();
        let registry: MirrorRegistry = [MirrorDefinition::new("empty", &[])].into_iter().collect();

        let result = resolve_mirror(&probe, "mirror://empty/x", &registry).await?;

        let CheckResult::Mirror(check) = result else {
            panic!("expected a mirror result");
        };
        assert!(check.entries.is_empty());
        assert!(!check.available);
        assert_eq!(check.error, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_mirror_is_reported_not_raised() -> Result<()> {
        let probe = RecordingProbe::default();

        let result = resolve_mirror(&probe, "mirror://doesnotexist/x", &openbsd_registry()).await?;

        let CheckResult::Mirror(check) = result else {
            panic!("expected a mirror result");
        };
        assert_eq!(check.mirror, "doesnotexist");
        assert_eq!(check.path, "x");
        assert!(!check.available);
        assert!(check.entries.is_empty());
        assert!(check.error.unwrap().contains("doesnotexist"));
        assert!(probe.calls().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_id_matches_no_mirror() -> Result<()> {
        let probe = RecordingProbe::default();
        let registry: MirrorRegistry = [MirrorDefinition::new("", &["https://anonymous.example"])]
            .into_iter()
            .collect();

        let result = resolve_mirror(&probe, "mirror:///x", &registry).await?;

        let CheckResult::Mirror(check) = result else {
            panic!("expected a mirror result");
        };
        assert!(!check.available);
        assert!(check.entries.is_empty());
        assert!(check.error.unwrap().contains("not defined"));
        assert!(probe.calls().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_reference_is_an_error() {
        let probe = RecordingProbe::default();

        let err = resolve_mirror(&probe, "mirror://openbsd", &openbsd_registry())
            .await
            .unwrap_err();

        assert!(matches!(err, CheckerError::MalformedMirrorUrl(_)));
    }
}
