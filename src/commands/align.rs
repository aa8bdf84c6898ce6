use crate::cli::AlignArgs;
use crate::poa::{align_to_graph, generate_alignment_strings, integrate_alignment, PoaGraph};
use crate::utils::{open_fasta_reader, FastaReader, Result};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};

/// Runs the full alignment pipeline: seed the graph with the first record,
/// align and integrate every further record in input order, then render the
/// alignment table.
pub fn align(args: AlignArgs) -> Result<()> {
    let reader = open_fasta_reader(&args.reads_path)?;
    let mut records = FastaReader::new(reader);

    let first = match records.next() {
        Some(record) => record?,
        None => {
            return Err(format!(
                "No sequences found in {}",
                args.reads_path.display()
            ))
        }
    };

    let mut graph = PoaGraph::new();
    let mut seen_names: HashSet<String> = HashSet::new();
    seen_names.insert(first.name.clone());
    graph.add_chain(&first.seq, &first.name, true);
    log::info!("Seeded graph with {} ({} residues)", first.name, first.seq.len());

    for record in records {
        let record = record?;
        if !seen_names.insert(record.name.clone()) {
            return Err(format!("Duplicate sequence name: {}", record.name));
        }

        let alignment = align_to_graph(&mut graph, &args.aln_scoring, &record.seq, &record.name)?;
        integrate_alignment(&mut graph, &alignment)?;
        log::debug!(
            "Integrated {} ({} residues): graph now has {} nodes and {} edges",
            record.name,
            record.seq.len(),
            graph.node_count(),
            graph.edge_count()
        );
    }

    log::info!(
        "Aligned {} sequences: {} nodes, {} edges",
        graph.sequence_count(),
        graph.node_count(),
        graph.edge_count()
    );

    let (names, rows) = generate_alignment_strings(&mut graph, args.max_fraction)?;

    let mut writer: Box<dyn Write> = match &args.output_path {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).map_err(|e| format!("Failed to create {}: {}", path.display(), e))?,
        )),
        None => Box::new(std::io::stdout().lock()),
    };
    for (name, row) in names.iter().zip(&rows) {
        writeln!(writer, "{:<12}\t{}", name, row).map_err(|e| e.to_string())?;
    }
    writer.flush().map_err(|e| e.to_string())?;

    Ok(())
}
