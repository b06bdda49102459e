//! Integration tests for bounded-latency chronological merging of
//! several module streams.

use eventform_reduction::{ChronoMerger, NeutronEvent};

/// Three locally ordered module streams, fed in interleaved bursts,
/// come out globally ordered; the ready criterion releases one latency
/// window per round.
#[test]
fn interleaved_bursts_pop_in_global_order() {
    let mut merger: ChronoMerger<NeutronEvent> = ChronoMerger::new(20, 3);
    let mut released = Vec::new();

    for round in 0..6u64 {
        for module in 0..3usize {
            let t = round * 50 + module as u64 * 3;
            merger
                .insert(module, NeutronEvent::new(t, module as u32))
                .unwrap();
        }
        merger.sort();
        while merger.ready() {
            released.push(merger.pop_earliest().unwrap().time);
        }
    }
    // five complete rounds released during streaming, the last held back
    assert_eq!(released.len(), 15);

    while let Some(item) = merger.pop_earliest() {
        released.push(item.time);
    }
    assert_eq!(released.len(), 18);
    assert!(released.windows(2).all(|w| w[0] <= w[1]));
}

/// A silent module pins the horizon at zero; declaring it clock-synced
/// with an active one unblocks the stream.
#[test]
fn stalled_module_blocks_release_until_synced() {
    let mut merger: ChronoMerger<NeutronEvent> = ChronoMerger::new(10, 3);
    merger.insert(0, NeutronEvent::new(5, 0)).unwrap();
    merger.insert(0, NeutronEvent::new(90, 0)).unwrap();
    merger.insert(1, NeutronEvent::new(95, 0)).unwrap();
    merger.sort();
    assert!(!merger.ready());

    merger.sync_up(1, 2).unwrap();
    assert!(merger.ready());
    assert_eq!(merger.pop_earliest().unwrap().time, 5);
    // the remaining item is still within the latency bound
    assert!(!merger.ready());
}

/// After a clock-epoch reset the queue survives but nothing is released
/// until every module has reported under the new epoch.
#[test]
fn reset_holds_the_stream_until_marks_rebuild() {
    let mut merger: ChronoMerger<NeutronEvent> = ChronoMerger::new(10, 2);
    merger.insert(0, NeutronEvent::new(100, 0)).unwrap();
    merger.insert(1, NeutronEvent::new(100, 1)).unwrap();
    merger.insert(0, NeutronEvent::new(200, 2)).unwrap();
    merger.insert(1, NeutronEvent::new(200, 3)).unwrap();
    merger.sort();
    assert!(merger.ready());

    merger.reset();
    assert!(!merger.ready());
    assert_eq!(merger.len(), 4);

    merger.insert(0, NeutronEvent::new(250, 4)).unwrap();
    merger.insert(1, NeutronEvent::new(260, 5)).unwrap();
    merger.sort();
    assert!(merger.ready());
}

/// The merger is generic over anything carrying a timestamp.
#[test]
fn merges_any_time_tagged_item() {
    let mut merger: ChronoMerger<u64> = ChronoMerger::new(0, 2);
    merger.insert_many(0, [4u64, 9]).unwrap();
    merger.insert_many(1, [2u64, 7]).unwrap();
    merger.sort();

    let mut out = Vec::new();
    while let Some(t) = merger.pop_earliest() {
        out.push(t);
    }
    assert_eq!(out, vec![2, 4, 7, 9]);
}
