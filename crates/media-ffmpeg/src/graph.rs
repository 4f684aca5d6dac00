use std::collections::HashSet;
use std::fmt::{Display, Formatter};

use crate::error::{MediaFfmpegError, Result};

/// Pass-through stage used when a chain has nothing else to do.
pub const PASSTHROUGH_FILTER: &str = "anull";

/// One `[in]...filters...[out]` chain of a filter graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterChain {
    pub inputs: Vec<String>,
    pub filters: String,
    pub outputs: Vec<String>,
}

impl Display for FilterChain {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for input in &self.inputs {
            write!(f, "[{input}]")?;
        }
        f.write_str(&self.filters)?;
        for output in &self.outputs {
            write!(f, "[{output}]")?;
        }
        Ok(())
    }
}

/// Filter graph whose pins are checked while it is assembled.
///
/// Every output pin is produced once and every consumed pin is either an
/// input stream specifier (`0:a`) or a pin produced by an earlier chain that
/// nothing has consumed yet.
///
/// # Example
/// ```
/// use media_ffmpeg::FilterGraph;
///
/// let mut graph = FilterGraph::default();
/// graph.push(&["0:a"], "volume=2", &["loud"]).expect("fresh pin");
/// graph.push(&["loud"], "", &["out"]).expect("pin is produced above");
/// assert_eq!(graph.to_string(), "[0:a]volume=2[loud]; [loud]anull[out]");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterGraph {
    chains: Vec<FilterChain>,
    produced: HashSet<String>,
    consumed: HashSet<String>,
}

impl FilterGraph {
    /// Appends one chain. An empty `filters` becomes [`PASSTHROUGH_FILTER`].
    pub fn push(&mut self, inputs: &[&str], filters: &str, outputs: &[&str]) -> Result<()> {
        let mut consumed_here = HashSet::new();
        for input in inputs {
            if is_stream_specifier(input) {
                continue;
            }
            let available = self.produced.contains(*input) && !self.consumed.contains(*input);
            if !available || !consumed_here.insert(*input) {
                return Err(MediaFfmpegError::UndefinedPin((*input).to_string()));
            }
        }

        let mut produced_here = HashSet::new();
        for output in outputs {
            if output.is_empty()
                || is_stream_specifier(output)
                || self.produced.contains(*output)
                || !produced_here.insert(*output)
            {
                return Err(MediaFfmpegError::DuplicatePin((*output).to_string()));
            }
        }

        self.consumed
            .extend(consumed_here.into_iter().map(str::to_string));
        self.produced
            .extend(produced_here.into_iter().map(str::to_string));

        let filters = if filters.is_empty() {
            PASSTHROUGH_FILTER.to_string()
        } else {
            filters.to_string()
        };
        self.chains.push(FilterChain {
            inputs: inputs.iter().map(|input| input.to_string()).collect(),
            filters,
            outputs: outputs.iter().map(|output| output.to_string()).collect(),
        });
        Ok(())
    }

    /// Checks that `terminal` is the only produced pin left unconsumed.
    pub fn ensure_terminal(&self, terminal: &str) -> Result<()> {
        if !self.produced.contains(terminal) || self.consumed.contains(terminal) {
            return Err(MediaFfmpegError::UndefinedPin(terminal.to_string()));
        }
        let mut dangling: Vec<&String> = self
            .produced
            .iter()
            .filter(|label| label.as_str() != terminal && !self.consumed.contains(*label))
            .collect();
        dangling.sort();
        if let Some(label) = dangling.first() {
            return Err(MediaFfmpegError::DanglingPin((*label).clone()));
        }
        Ok(())
    }

    pub fn chains(&self) -> &[FilterChain] {
        &self.chains
    }

    /// Returns the chain producing `label`.
    pub fn producer_of(&self, label: &str) -> Option<&FilterChain> {
        self.chains
            .iter()
            .find(|chain| chain.outputs.iter().any(|output| output == label))
    }
}

impl Display for FilterGraph {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (index, chain) in self.chains.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{chain}")?;
        }
        Ok(())
    }
}

fn is_stream_specifier(label: &str) -> bool {
    label
        .split_once(':')
        .is_some_and(|(index, _)| !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::FilterGraph;
    use crate::MediaFfmpegError;

    #[test]
    fn push_rejects_pin_produced_twice() {
        let mut graph = FilterGraph::default();
        graph
            .push(&["0:a"], "anull", &["a0"])
            .expect("first producer");

        let result = graph.push(&["1:a"], "anull", &["a0"]);
        assert!(matches!(result, Err(MediaFfmpegError::DuplicatePin(label)) if label == "a0"));
    }

    #[test]
    fn push_rejects_pin_consumed_before_it_exists() {
        let mut graph = FilterGraph::default();
        let result = graph.push(&["ac"], "anull", &["out"]);
        assert!(matches!(result, Err(MediaFfmpegError::UndefinedPin(label)) if label == "ac"));
        assert!(graph.chains().is_empty());
    }

    #[test]
    fn push_rejects_pin_consumed_twice() {
        let mut graph = FilterGraph::default();
        graph.push(&["0:a"], "anull", &["a0"]).expect("producer");
        graph.push(&["a0"], "anull", &["a1"]).expect("first consumer");

        let result = graph.push(&["a0"], "anull", &["a2"]);
        assert!(matches!(result, Err(MediaFfmpegError::UndefinedPin(label)) if label == "a0"));
    }

    #[test]
    fn ensure_terminal_rejects_dangling_intermediate_pin() {
        let mut graph = FilterGraph::default();
        graph.push(&["0:a"], "anull", &["a0"]).expect("producer");
        graph.push(&["1:a"], "anull", &["a1"]).expect("producer");

        assert!(matches!(
            graph.ensure_terminal("a1"),
            Err(MediaFfmpegError::DanglingPin(label)) if label == "a0"
        ));
        assert!(graph.ensure_terminal("missing").is_err());
    }

    #[test]
    fn display_joins_chains_in_insertion_order() {
        let mut graph = FilterGraph::default();
        graph.push(&["0:a"], "anull", &["a0"]).expect("producer");
        graph.push(&["1:a"], "anull", &["a1"]).expect("producer");
        graph
            .push(&["a0", "a1"], "amix=inputs=2", &["mix"])
            .expect("mix");

        assert_eq!(
            graph.to_string(),
            "[0:a]anull[a0]; [1:a]anull[a1]; [a0][a1]amix=inputs=2[mix]"
        );
        graph.ensure_terminal("mix").expect("only mix is left");
        assert_eq!(
            graph.producer_of("a1").map(|chain| chain.inputs.clone()),
            Some(vec!["1:a".to_string()])
        );
    }
}
