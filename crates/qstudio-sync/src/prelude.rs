//! Backend configuration boilerplate placed in the program's config step.

use qstudio_oracle::BackendCredentials;
use qstudio_source::marker::step_marker;
use qstudio_source::{SectionKind, StepRole, parse};
use tracing::debug;

/// Title of the config step added when a source has none.
pub const CONFIG_STEP_TITLE: &str = "Backend Config";

/// Which backend the program should run against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prelude {
    /// Local Aer simulator.
    LocalSimulator,
    /// Remote runtime service.
    RuntimeService(BackendCredentials),
}

impl Prelude {
    /// Pick the prelude for optional credentials.
    pub fn for_credentials(credentials: Option<&BackendCredentials>) -> Self {
        match credentials {
            Some(creds) => Prelude::RuntimeService(creds.clone()),
            None => Prelude::LocalSimulator,
        }
    }

    /// Whether runtime-only `.options.` lines must go.
    pub fn is_local(&self) -> bool {
        matches!(self, Prelude::LocalSimulator)
    }

    /// Body of the config step, framed by one leading and one trailing blank line.
    pub fn render(&self) -> String {
        let code = match self {
            Prelude::LocalSimulator => "\
from qiskit_aer import AerSimulator

backend = AerSimulator()
print(\"Using local simulator...\")"
                .to_string(),
            Prelude::RuntimeService(creds) => {
                let mut params = vec![
                    format!("channel=\"{}\"", creds.channel),
                    format!("token=\"{}\"", creds.token),
                ];
                if let Some(instance) = &creds.instance {
                    params.push(format!("instance=\"{instance}\""));
                }
                if let Some(region) = &creds.region {
                    params.push(format!("region=\"{region}\""));
                }
                format!(
                    "from qiskit_ibm_runtime import QiskitRuntimeService\n\
                     \n\
                     service = QiskitRuntimeService(\n    {}\n)\n\
                     backend = service.least_busy(operational=True, simulator=False)\n\
                     print(f\"Using IBM Quantum backend: {{backend.name}}\")",
                    params.join(",\n    ")
                )
            }
        };
        format!("\n{code}\n\n")
    }

    /// Put this prelude into `text`.
    ///
    /// An existing config step (every section under it) gets its body
    /// replaced. Otherwise a config step is inserted before the first
    /// section; a source without markers also gets a step marker in front
    /// of its code so the config step ends where the program starts.
    /// Applying the same prelude twice yields the same text.
    pub fn apply(&self, text: &str) -> String {
        let parsed = parse(text);
        let body = self.render();

        let config_step = parsed
            .sections
            .iter()
            .position(|s| s.kind == SectionKind::Step && s.role == StepRole::Config);

        if let Some(idx) = config_step {
            let first = &parsed.sections[idx];
            let end = parsed.sections[idx + 1..]
                .iter()
                .take_while(|s| s.kind != SectionKind::Step)
                .last()
                .map_or(first.span.end, |s| s.span.end);

            debug!(step = ?first.step, "Replacing config step body");
            let mut out = String::with_capacity(text.len() + body.len());
            out.push_str(&text[..first.body_span.start]);
            out.push_str(&body);
            out.push_str(&text[end..]);
            return out;
        }

        debug!("Inserting config step");
        let header = step_marker(0, CONFIG_STEP_TITLE);
        let mut out = String::with_capacity(text.len() + header.len() + body.len() + 32);
        if parsed.sections.is_empty() {
            out.push_str(&header);
            out.push_str(&body);
            if !text.is_empty() {
                out.push_str(&step_marker(1, "Program"));
                out.push_str(text);
            }
        } else {
            let at = parsed.preamble.len();
            out.push_str(&text[..at]);
            out.push_str(&header);
            out.push_str(&body);
            out.push_str(&text[at..]);
        }
        out
    }

    /// The text to hand to the execution service.
    ///
    /// Local runs also lose every line that configures runtime-only options.
    pub fn prepare_for_execution(&self, text: &str) -> String {
        let applied = self.apply(text);
        if self.is_local() {
            strip_runtime_options(&applied)
        } else {
            applied
        }
    }
}

/// Remove lines that set runtime-only `.options.` attributes.
pub fn strip_runtime_options(text: &str) -> String {
    text.split_inclusive('\n')
        .filter(|line| !line.contains(".options."))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const WITH_CONFIG: &str = "\
import numpy as np
## STEP 0 : IBM Quantum Config
from qiskit_ibm_runtime import QiskitRuntimeService

service = QiskitRuntimeService()
backend = service.least_busy(operational=True, simulator=False)

## STEP 1 : Mapping the problem
###[Circuit]
qc = QuantumCircuit(2)
## STEP 3 : Execute
###[Estimator]
estimator = Estimator(mode=backend)
estimator.options.resilience_level = 1
job = estimator.run([pub])
";

    #[test]
    fn test_replaces_existing_config_step() {
        let out = Prelude::LocalSimulator.apply(WITH_CONFIG);
        assert!(out.starts_with(
            "import numpy as np\n## STEP 0 : IBM Quantum Config\n\nfrom qiskit_aer import AerSimulator\n"
        ));
        assert!(!out.contains("QiskitRuntimeService"));
        assert!(out.contains("print(\"Using local simulator...\")\n\n## STEP 1 : Mapping the problem\n"));
        // Options survive apply; only execution strips them.
        assert!(out.contains(".options."));
    }

    #[test]
    fn test_apply_is_idempotent() {
        for prelude in [
            Prelude::LocalSimulator,
            Prelude::RuntimeService(BackendCredentials::new("tok")),
        ] {
            for src in [WITH_CONFIG, "## STEP 1 : Map\nx = 1\n", "x = 1\n", ""] {
                let once = prelude.apply(src);
                assert_eq!(prelude.apply(&once), once, "source: {src:?}");
            }
        }
    }

    #[test]
    fn test_switching_prelude_replaces_not_duplicates() {
        let local = Prelude::LocalSimulator.apply("## STEP 1 : Map\nx = 1\n");
        let remote = Prelude::RuntimeService(BackendCredentials::new("tok")).apply(&local);
        assert_eq!(remote.matches("## STEP 0").count(), 1);
        assert!(!remote.contains("AerSimulator"));
        assert!(remote.ends_with("## STEP 1 : Map\nx = 1\n"));
    }

    #[test]
    fn test_inserted_after_preamble() {
        let out = Prelude::LocalSimulator.apply("import json\n## STEP 1 : Map\nx = 1\n");
        assert!(out.starts_with("import json\n## STEP 0 : Backend Config\n\nfrom qiskit_aer"));
    }

    #[test]
    fn test_unmarked_source_gets_program_step() {
        let out = Prelude::LocalSimulator.apply("x = 1\n");
        assert!(out.starts_with("## STEP 0 : Backend Config\n"));
        assert!(out.ends_with("## STEP 1 : Program\nx = 1\n"));
    }

    #[test]
    fn test_runtime_service_parameters() {
        let creds = BackendCredentials {
            token: "tok".into(),
            channel: "ibm_cloud".into(),
            instance: Some("crn:abc".into()),
            region: Some("us-east".into()),
        };
        let body = Prelude::RuntimeService(creds).render();
        assert!(body.contains(
            "service = QiskitRuntimeService(\n    channel=\"ibm_cloud\",\n    token=\"tok\",\n    instance=\"crn:abc\",\n    region=\"us-east\"\n)\n"
        ));
        assert!(body.contains("print(f\"Using IBM Quantum backend: {backend.name}\")"));
    }

    #[test]
    fn test_execution_copy_strips_options_locally() {
        let local = Prelude::LocalSimulator.prepare_for_execution(WITH_CONFIG);
        assert!(!local.contains(".options."));
        assert!(local.contains("job = estimator.run([pub])\n"));

        let remote = Prelude::RuntimeService(BackendCredentials::new("t")).prepare_for_execution(WITH_CONFIG);
        assert!(remote.contains("estimator.options.resilience_level = 1\n"));
    }
}
