use crossbeam_channel::unbounded;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use tsink_list::{
    DataPoint, IterationMode, Partition, PartitionList, PartitionListBuilder, Result,
    SharedPartition,
};

struct FakePartition {
    min: i64,
    max: i64,
}

impl FakePartition {
    fn shared(min: i64, max: i64) -> SharedPartition {
        Arc::new(Self { min, max })
    }
}

impl Partition for FakePartition {
    fn insert_points(&self, _points: &[DataPoint]) -> Result<Vec<DataPoint>> {
        Ok(Vec::new())
    }

    fn select_points(&self, _start: i64, _end: i64) -> Result<Vec<DataPoint>> {
        Ok(Vec::new())
    }

    fn min_timestamp(&self) -> i64 {
        self.min
    }

    fn max_timestamp(&self) -> i64 {
        self.max
    }

    fn size(&self) -> usize {
        0
    }

    fn active(&self) -> bool {
        true
    }

    fn expired(&self) -> bool {
        false
    }

    fn clean(&self) -> Result<()> {
        Ok(())
    }
}

fn spawn_readers(
    list: &Arc<PartitionList>,
    done: &Arc<AtomicBool>,
    readers: usize,
) -> Vec<thread::JoinHandle<usize>> {
    (0..readers)
        .map(|_| {
            let list = Arc::clone(list);
            let done = Arc::clone(done);
            thread::spawn(move || {
                let mut passes = 0;
                loop {
                    let finished = done.load(Ordering::SeqCst);
                    let mut last = i64::MIN;
                    for partition in list.iter() {
                        let ts = partition.min_timestamp();
                        assert!(ts > last, "iteration went backwards: {} after {}", ts, last);
                        last = ts;
                    }
                    passes += 1;
                    if finished {
                        break passes;
                    }
                }
            })
        })
        .collect()
}

#[test]
fn test_readers_during_insert_remove_and_swap() {
    let list = Arc::new(PartitionList::new());
    let done = Arc::new(AtomicBool::new(false));
    let total = 2000i64;

    let (retire_tx, retire_rx) = unbounded::<SharedPartition>();
    let (compact_tx, compact_rx) = unbounded::<SharedPartition>();

    let readers = spawn_readers(&list, &done, 4);

    let writer = {
        let list = Arc::clone(&list);
        thread::spawn(move || {
            for ts in 1..=total {
                let partition = FakePartition::shared(ts, ts);
                list.insert(partition.clone());
                retire_tx.send(partition).unwrap();
            }
        })
    };

    let retirer = {
        let list = Arc::clone(&list);
        thread::spawn(move || {
            for partition in retire_rx {
                if partition.min_timestamp() % 2 == 0 {
                    list.remove(&partition).unwrap();
                } else {
                    compact_tx.send(partition).unwrap();
                }
            }
        })
    };

    let compactor = {
        let list = Arc::clone(&list);
        thread::spawn(move || {
            for partition in compact_rx {
                let ts = partition.min_timestamp();
                let old = list
                    .swap(&partition, FakePartition::shared(ts, ts + 1))
                    .unwrap();
                assert!(Arc::ptr_eq(&old, &partition));
            }
        })
    };

    writer.join().unwrap();
    retirer.join().unwrap();
    compactor.join().unwrap();
    done.store(true, Ordering::SeqCst);

    for reader in readers {
        assert!(reader.join().unwrap() > 0);
    }

    let remaining = list.snapshot();
    assert_eq!(remaining.len(), (total / 2) as usize);
    assert_eq!(list.size(), remaining.len());
    for (idx, partition) in remaining.iter().enumerate() {
        let expected = 2 * idx as i64 + 1;
        assert_eq!(partition.min_timestamp(), expected);
        assert_eq!(partition.max_timestamp(), expected + 1);
    }

    let stats = list.stats();
    assert_eq!(stats.inserts, total as u64);
    assert_eq!(stats.removals, (total / 2) as u64);
    assert_eq!(stats.swaps, (total / 2) as u64);
    assert_eq!(stats.misses, 0);
    assert_eq!(stats.allocated_slots, stats.partitions + stats.free_slots);
}

#[test]
fn test_racing_retirements_remove_each_partition_once() {
    let list = Arc::new(PartitionList::new());
    let partitions: Vec<_> = (1..=500).map(|ts| FakePartition::shared(ts, ts)).collect();
    for partition in &partitions {
        list.insert(partition.clone());
    }

    let removed = Arc::new(AtomicUsize::new(0));
    let missed = Arc::new(AtomicUsize::new(0));
    let partitions = Arc::new(partitions);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let list = Arc::clone(&list);
            let partitions = Arc::clone(&partitions);
            let removed = Arc::clone(&removed);
            let missed = Arc::clone(&missed);
            thread::spawn(move || {
                for partition in partitions.iter() {
                    match list.remove(partition) {
                        Ok(_) => removed.fetch_add(1, Ordering::SeqCst),
                        Err(err) => {
                            assert!(err.is_not_found());
                            missed.fetch_add(1, Ordering::SeqCst)
                        }
                    };
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(removed.load(Ordering::SeqCst), 500);
    assert_eq!(missed.load(Ordering::SeqCst), 3 * 500);
    assert!(list.is_empty());
    assert!(list.head().is_none());
    assert!(list.tail().is_none());
    assert_eq!(list.iter().count(), 0);
}

#[test]
fn test_snapshot_readers_during_writes() {
    let list = Arc::new(
        PartitionListBuilder::new()
            .with_iteration_mode(IterationMode::Snapshot)
            .build()
            .unwrap(),
    );
    let done = Arc::new(AtomicBool::new(false));
    let readers = spawn_readers(&list, &done, 2);

    let writer = {
        let list = Arc::clone(&list);
        thread::spawn(move || {
            let mut live = Vec::new();
            for ts in 1..=1000 {
                let partition = FakePartition::shared(ts, ts);
                list.insert(partition.clone());
                live.push(partition);
                if live.len() > 16 {
                    let oldest = live.remove(0);
                    list.remove(&oldest).unwrap();
                }
            }
        })
    };

    writer.join().unwrap();
    done.store(true, Ordering::SeqCst);
    for reader in readers {
        reader.join().unwrap();
    }

    assert_eq!(list.size(), 16);
    assert_eq!(list.head().unwrap().min_timestamp(), 985);
    assert_eq!(list.tail().unwrap().min_timestamp(), 1000);
}
