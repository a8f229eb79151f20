mod common;

use common::{article, index, open_engine};
use linkidx::document::{CONTENT, WIKI_ID};
use linkidx::{FieldValue, IdMap, TermStats};
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::tempdir;

#[test]
fn readers_keep_their_snapshot_while_another_thread_commits() {
    let dir = tempdir().unwrap();
    let engine = open_engine(dir.path());
    index(&engine, &[article(1, "rock band"), article(2, "jazz band")]);
    engine.ensure_id_map().unwrap();

    const READERS: usize = 4;
    // views taken, then commit published
    let taken = Barrier::new(READERS + 1);
    let published = Barrier::new(READERS + 1);

    thread::scope(|s| {
        for _ in 0..READERS {
            s.spawn(|| {
                let view = engine.searcher().view();
                taken.wait();
                for _ in 0..50 {
                    assert_eq!(view.num_docs(), 2);
                    assert_eq!(view.phrase_frequency(&["rock", "band"], CONTENT), 1);
                    assert_eq!(TermStats::new(&view).document_frequency("band", CONTENT), 2);
                }
                published.wait();
                // still the old snapshot after the commit is visible
                assert_eq!(view.num_docs(), 2);
                assert_eq!(view.phrase_frequency(&["rock", "band"], CONTENT), 1);
                // a fresh view sees the new generation
                let fresh = engine.searcher().view();
                assert_eq!(fresh.num_docs(), 3);
                assert_eq!(fresh.phrase_frequency(&["rock", "band"], CONTENT), 2);
            });
        }
        s.spawn(|| {
            taken.wait();
            let mut writer = engine.writer().unwrap();
            engine.add_article(&mut writer, &article(3, "another rock band")).unwrap();
            writer.commit().unwrap();
            drop(writer);
            engine.refresh().unwrap();
            published.wait();
        });
    });

    let map = engine.id_map().get().unwrap();
    assert_eq!(map.generation(), engine.searcher().view().generation());
    assert_eq!(map.lookup(3), Some(2));
}

#[test]
fn concurrent_map_builds_are_serialized() {
    let dir = tempdir().unwrap();
    let engine = open_engine(dir.path());
    index(&engine, &[article(10, "a"), article(20, "b"), article(30, "c")]);
    let view = engine.searcher().view();
    let handle = engine.id_map();

    let results = thread::scope(|s| {
        let first = s.spawn(|| handle.build_and_persist(&view).unwrap());
        let second = s.spawn(|| handle.build_and_persist(&view).unwrap());
        [first.join().unwrap(), second.join().unwrap()]
    });

    // one caller scanned, the other waited for it and got the same map
    assert_eq!(results.iter().filter(|(_, report)| report.is_some()).count(), 1);
    assert!(Arc::ptr_eq(&results[0].0, &results[1].0));
    assert_eq!(IdMap::load(handle.path()).unwrap(), *results[0].0);
    assert_eq!(results[0].0.lookup(20), Some(1));
}

#[test]
fn concurrent_refreshes_leave_a_matching_pair() {
    let dir = tempdir().unwrap();
    let engine = open_engine(dir.path());
    index(&engine, &[article(1, "a")]);
    engine.ensure_id_map().unwrap();

    let mut writer = engine.writer().unwrap();
    engine.add_article(&mut writer, &article(2, "b")).unwrap();
    writer.commit().unwrap();
    drop(writer);

    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| engine.refresh().unwrap());
            s.spawn(|| {
                // either the old pair or the new one, never a mix
                assert!(engine.reranker().is_ok());
                let doc = engine.document(1).expect("external id 1 is indexed in every generation");
                assert_eq!(doc.get(WIKI_ID).and_then(FieldValue::as_int), Some(1));
            });
        }
    });

    let map = engine.id_map().get().unwrap();
    assert_eq!(map.generation(), engine.searcher().view().generation());
    assert_eq!(map.lookup(2), Some(1));
    assert!(engine.reranker().is_ok());
}
