// DOT Export
// Minimal writer for the Graphviz DOT text format

/// Incrementally builds one `digraph`.
///
/// Vertex ids are written quoted, so any string is a valid id.
#[derive(Debug)]
pub(crate) struct DotWriter {
    output: String,
}

impl DotWriter {
    pub(crate) fn new(name: &str) -> Self {
        let mut output = String::new();
        output.push_str(&format!("digraph \"{}\" {{\n", escape(name)));
        output.push_str("  rankdir=LR;\n");
        output.push_str("  node [shape=box, style=rounded];\n");
        Self { output }
    }

    /// Add a vertex whose label is `lines` joined with DOT line breaks
    pub(crate) fn vertex(&mut self, id: &str, lines: &[String]) {
        let label: Vec<String> = lines.iter().map(|line| escape(line)).collect();
        self.output.push_str(&format!(
            "  \"{}\" [label=\"{}\"];\n",
            escape(id),
            label.join("\\n")
        ));
    }

    pub(crate) fn edge(&mut self, from: &str, to: &str, label: Option<&str>) {
        let label_attr = match label {
            Some(label) => format!(" [label=\"{}\"]", escape(label)),
            None => String::new(),
        };
        self.output.push_str(&format!(
            "  \"{}\" -> \"{}\"{};\n",
            escape(from),
            escape(to),
            label_attr
        ));
    }

    pub(crate) fn finish(mut self) -> String {
        self.output.push_str("}\n");
        self.output
    }
}

/// Escape quotes, backslashes and control characters for a quoted DOT string
pub(crate) fn escape(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_output() {
        let mut writer = DotWriter::new("plan");
        writer.vertex("a", &["first".to_string(), "in: file:///tmp/x".to_string()]);
        writer.vertex("b", &["second".to_string()]);
        writer.edge("a", "b", Some("mid"));
        writer.edge("b", "a", None);
        let dot = writer.finish();

        assert!(dot.starts_with("digraph \"plan\" {"));
        assert!(dot.contains("\"a\" [label=\"first\\nin: file:///tmp/x\"];"));
        assert!(dot.contains("\"a\" -> \"b\" [label=\"mid\"];"));
        assert!(dot.contains("\"b\" -> \"a\";"));
        assert!(dot.trim_end().ends_with('}'));
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("normal"), "normal");
        assert_eq!(escape("with\"quote"), "with\\\"quote");
        assert_eq!(escape("with\\backslash"), "with\\\\backslash");
        assert_eq!(escape("with\nnewline"), "with\\nnewline");
    }
}
