use crate::cli::GenotypeArgs;
use crate::locus::{stream_loci_into_channel, Locus};
use crate::utils::{
    create_writer, header_names_contigs, read_bam_header, resolve_sample_name, CancelToken, Error,
    Karyotype, Result,
};
use crate::workflows::{self, analyze_str, LocusResult};
use crate::writers::VcfWriter;
use crossbeam_channel::{bounded, Sender};
use rayon::{
    iter::{ParallelBridge, ParallelIterator},
    ThreadPoolBuilder,
};
use rust_htslib::bam;
use std::{
    cell::RefCell,
    collections::BTreeMap,
    path::PathBuf,
    sync::Arc,
    thread,
};

thread_local! {
    static CTX_READS_PATH: RefCell<Option<PathBuf>> = const { RefCell::new(None) };
    static THREAD_BAM_READER: RefCell<Option<bam::IndexedReader>> = const { RefCell::new(None) };
}

const CHANNEL_BUFFER_SIZE: usize = 2048;

pub fn genotype(args: GenotypeArgs) -> Result<()> {
    let karyotype = Karyotype::new(&args.karyotype)?;

    let bam_header = read_bam_header(&args.reads_path)?;
    if !header_names_contigs(&bam_header) {
        return Err(Error::Config(
            "Input BAM names no contigs; are the reads mapped?".to_string(),
        ));
    }

    let sample_name = match args.sample_name {
        Some(name) => name,
        None => resolve_sample_name(&args.reads_path, &bam_header)?,
    };

    let mut vcf_writer = create_writer(&args.output_prefix, "vcf.gz", |path| {
        VcfWriter::new(path, &sample_name, &bam_header)
    })?;

    let (sender_locus, receiver_locus) = bounded(CHANNEL_BUFFER_SIZE);
    let repeats_path = args.repeats_path.clone();
    let genome_path = args.genome_path.clone();
    let flank_len = args.flank_len;
    let max_unit_count = args.max_unit_count;
    let locus_stream_thread = thread::spawn(move || {
        stream_loci_into_channel(
            &repeats_path,
            &genome_path,
            flank_len,
            max_unit_count,
            &karyotype,
            sender_locus,
        )
    });

    let preserve_order = args.preserve_order;
    let (sender_result, receiver_result) = bounded::<(usize, Option<(Locus, LocusResult)>)>(
        CHANNEL_BUFFER_SIZE,
    );
    let writer_thread = thread::spawn(move || {
        if preserve_order {
            // Reordering buffer: emit loci in catalogue order, skipping over
            // indices whose locus failed upstream.
            let mut pending: BTreeMap<usize, Option<(Locus, LocusResult)>> = BTreeMap::new();
            let mut next_index = 0;
            for (index, entry) in &receiver_result {
                pending.insert(index, entry);
                while let Some(entry) = pending.remove(&next_index) {
                    if let Some((locus, results)) = entry {
                        write_result(&mut vcf_writer, &locus, &results);
                    }
                    next_index += 1;
                }
            }
            for entry in pending.into_values().flatten() {
                write_result(&mut vcf_writer, &entry.0, &entry.1);
            }
        } else {
            for (_, entry) in &receiver_result {
                if let Some((locus, results)) = entry {
                    write_result(&mut vcf_writer, &locus, &results);
                }
            }
        }
    });

    let workflow_params = Arc::new(workflows::Params {
        search_flank_len: args.flank_len,
        read_len: args.read_len,
        prop_correct: args.prop_correct,
        hap_depth: args.hap_depth,
        max_depth: args.max_depth,
        min_match_frac: args.min_match_frac,
        scoring: args.aln_scoring,
    });

    let cancel = CancelToken::new();

    log::debug!("Initializing thread pool with {} threads...", args.num_threads);
    let pool = initialize_thread_pool(args.num_threads, args.reads_path.clone())?;
    pool.install(|| {
        receiver_locus
            .into_iter()
            .par_bridge()
            .for_each_with(&sender_result, |sender, (index, locus_result)| {
                match locus_result {
                    Ok(locus) => process_locus(index, locus, &workflow_params, &cancel, sender),
                    Err(err) => {
                        log::error!("Locus processing: {:#}", err);
                        send_result(sender, index, None);
                    }
                }
            });
    });

    drop(sender_result);
    writer_thread
        .join()
        .map_err(|_| Error::Internal("Writer thread panicked".to_string()))?;
    log::trace!("Writer thread finished");
    match locus_stream_thread.join() {
        Ok(Ok(())) => log::trace!("Locus stream thread finished"),
        Ok(Err(e)) => log::error!("Locus streaming failed: {}", e),
        Err(_) => return Err(Error::Internal("Locus stream thread panicked".to_string())),
    }

    Ok(())
}

fn write_result(vcf_writer: &mut VcfWriter, locus: &Locus, results: &LocusResult) {
    if let Err(e) = vcf_writer.write(locus, results) {
        log::error!("Failed to write locus {}: {}", locus.id, e);
    }
}

fn process_locus(
    index: usize,
    locus: Locus,
    workflow_params: &Arc<workflows::Params>,
    cancel: &CancelToken,
    sender: &Sender<(usize, Option<(Locus, LocusResult)>)>,
) {
    if cancel.is_cancelled() {
        send_result(sender, index, None);
        return;
    }

    THREAD_BAM_READER.with(|reader_cell| {
        let mut reader = reader_cell.borrow_mut();
        let reader = reader.get_or_insert_with(create_thread_local_bam_reader);
        match analyze_str(&locus, workflow_params, reader, cancel) {
            Ok(results) => send_result(sender, index, Some((locus, results))),
            Err(err) => {
                log::error!("Error analyzing locus {}: {}", locus.id, err);
                send_result(sender, index, None);
            }
        }
    });
}

fn send_result(
    sender: &Sender<(usize, Option<(Locus, LocusResult)>)>,
    index: usize,
    entry: Option<(Locus, LocusResult)>,
) {
    if let Err(e) = sender.send((index, entry)) {
        log::error!("Failed to send locus result to writer thread: {}", e);
    }
}

fn create_thread_local_bam_reader() -> bam::IndexedReader {
    let path = CTX_READS_PATH.with(|ctx_cell| {
        ctx_cell
            .borrow()
            .as_ref()
            .expect("Thread context parameters not initialized for BAM path")
            .clone()
    });
    bam::IndexedReader::from_path(&path).unwrap_or_else(|e| {
        panic!(
            "Failed to initialize BAM reader for path {}: {}",
            path.display(),
            e
        )
    })
}

fn initialize_thread_pool(num_threads: usize, reads_path: PathBuf) -> Result<rayon::ThreadPool> {
    ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .thread_name(|i| format!("srgt-{}", i))
        .start_handler(move |_thread_index| {
            CTX_READS_PATH.with(|cell| {
                *cell.borrow_mut() = Some(reads_path.clone());
            });
            log::trace!("Initialized thread {:?}", std::thread::current().id());
        })
        .exit_handler(|_thread_index| {
            CTX_READS_PATH.with(|cell| {
                *cell.borrow_mut() = None;
            });
        })
        .build()
        .map_err(|e| Error::Config(format!("Failed to initialize thread pool: {}", e)))
}
