use std::fmt::Write as _;

use otf2_cio_types::{Graph, VertexPayload};

/// Renders `graph` as Graphviz dot source.
pub fn to_dot(graph: &Graph) -> String {
    let mut out = String::new();
    out.push_str("digraph otf2_cio {\n");
    out.push_str("  rankdir=LR;\n");

    for vertex in graph.vertices() {
        let (shape, label) = match &vertex.payload {
            VertexPayload::IoEvent(e) => (
                "box",
                format!("{:?}\\n{}", e.kind, e.filename),
            ),
            VertexPayload::SyncEvent(s) => ("oval", format!("sync\\n{}", s.process)),
            VertexPayload::Synthetic(s) => ("doublecircle", s.kind.name().to_string()),
        };
        let _ = writeln!(
            out,
            "  v{} [shape={shape}, label=\"{label}\"];",
            vertex.id.index()
        );
    }

    for (u, v) in graph.edges() {
        let _ = writeln!(out, "  v{} -> v{};", u.index(), v.index());
    }

    out.push_str("}\n");
    out
}
