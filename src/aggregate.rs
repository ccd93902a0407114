use std::collections::HashMap;
use crate::data::{ConnectionAggregate, ConnectionKey, ConnectionRecord};

/// Counts records per (remote address, remote port, state), busiest first.
/// Keys with equal counts keep the order in which they were first seen.
pub fn aggregate(records: &[ConnectionRecord]) -> Vec<ConnectionAggregate> {
    let mut index = HashMap::<ConnectionKey, usize>::new();
    let mut stats = Vec::<ConnectionAggregate>::new();

    for record in records {
        let key = record.key();
        match index.get(&key) {
            Some(&i) => stats[i].count += 1,
            None     => {
                index.insert(key, stats.len());
                stats.push(ConnectionAggregate {
                    remote_addr: key.remote_addr,
                    remote_port: key.remote_port,
                    state:       key.state,
                    count:       1,
                });
            }
        }
    }

    stats.sort_by(|a, b| b.count.cmp(&a.count));

    stats
}
