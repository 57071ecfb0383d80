use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use otf2_cio_types::{CioSet, Graph, ProcessId, VertexId};

fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn write_summary(dir: &Path, graph: &Graph) -> Result<(), String> {
    let props = graph.properties();
    let mut out = String::from("key,value\n");
    out.push_str(&format!("num_locations,{}\n", props.num_locations));
    out.push_str(&format!("vertex_count,{}\n", graph.vertex_count()));
    out.push_str(&format!("total_wall_time,{}\n", props.total_wall_time));
    out.push_str(&format!(
        "total_file_io_time,{}\n",
        props.total_file_io_time
    ));
    out.push_str(&format!(
        "total_file_io_metadata_time,{}\n",
        props.total_file_io_metadata_time
    ));
    fs::write(dir.join("summary.csv"), out).map_err(|e| format!("write summary.csv: {e}"))
}

const CIO_SET_HEADER: &str = "proc_id,filename,region_name,paradigm,request_size,response_size,offset,kind,duration_ns,timestamp\n";

fn set_row(graph: &Graph, vertex_id: VertexId) -> Option<String> {
    let vertex = graph.vertex(vertex_id);
    let io = vertex.payload.as_io_event()?;
    let duration_ns = vertex.duration.duration().unwrap_or(0);
    Some(format!(
        "{},{},{},{},{},{},{},{:?},{},{}\n",
        io.process.raw(),
        csv_field(&io.filename),
        csv_field(&io.region_name),
        csv_field(&io.paradigm),
        io.request_size,
        io.response_size,
        io.offset,
        io.kind,
        duration_ns,
        io.timestamp,
    ))
}

fn write_set_files(out_dir: &Path, graph: &Graph, sets: &[CioSet]) -> Result<(), String> {
    fs::create_dir_all(out_dir).map_err(|e| format!("create {}: {e}", out_dir.display()))?;
    for (n, set) in sets.iter().enumerate() {
        let mut contents = CIO_SET_HEADER.to_string();
        for &member in &set.members {
            if let Some(row) = set_row(graph, member) {
                contents.push_str(&row);
            }
        }
        let path = out_dir.join(format!("set-{n}.csv"));
        fs::write(&path, contents).map_err(|e| format!("write {}: {e}", path.display()))?;
    }
    Ok(())
}

pub fn write_cio_sets(dir: &Path, graph: &Graph, sets: &[CioSet]) -> Result<(), String> {
    write_set_files(&dir.join("cio-sets"), graph, sets)
}

pub fn write_pio_sets(
    dir: &Path,
    graph: &Graph,
    fragments: &BTreeMap<ProcessId, Vec<CioSet>>,
) -> Result<(), String> {
    let root = dir.join("pio-sets");
    for (process, sets) in fragments {
        write_set_files(&root.join(process.raw().to_string()), graph, sets)?;
    }
    Ok(())
}
