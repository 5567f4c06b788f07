//! Cluster splitting: group consecutive RUMs into one hospitalization.

use casemix_stays::Stay;

fn same_facility_exit(stay: &Stay) -> bool {
    stay.exit.mode == b'6' || (stay.exit.mode == b'7' && stay.exit.destination == b'1')
}

fn same_facility_entry(stay: &Stay) -> bool {
    stay.entry.mode == b'6' || (stay.entry.mode == b'7' && stay.entry.origin == b'1')
}

/// Does `next` continue the hospitalization started by `prev`?
fn continues(prev: &Stay, next: &Stay) -> bool {
    if next.bill_id != prev.bill_id {
        return false;
    }
    // Death ends the stay; a transfer out of the facility ends it too.
    if prev.exit.mode == b'9' {
        return false;
    }
    if matches!(prev.exit.mode, b'6' | b'7') && !same_facility_exit(prev) {
        return false;
    }
    if !same_facility_entry(next) {
        return false;
    }
    // Contiguity: same day, or next day for an internal mutation.
    match (prev.exit.date, next.entry.date) {
        (Some(exit), Some(entry)) => {
            let gap = entry.signed_duration_since(exit).num_days();
            gap == 0 || (gap == 1 && next.entry.mode == b'6')
        }
        _ => false,
    }
}

/// Take the longest prefix of `stays` that forms one cluster; returns
/// `(cluster, remainder)`. The cluster is non-empty whenever `stays` is.
pub fn split_cluster(stays: &[Stay]) -> (&[Stay], &[Stay]) {
    let mut len = stays.len().min(1);
    while len < stays.len() && continues(&stays[len - 1], &stays[len]) {
        len += 1;
    }
    stays.split_at(len)
}

/// Cluster boundaries over a whole sequence, as `(start, len)` ranges in
/// input order.
pub fn cluster_ranges(stays: &[Stay]) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut rest = stays;
    let mut start = 0;
    while !rest.is_empty() {
        let (cluster, remainder) = split_cluster(rest);
        ranges.push((start, cluster.len()));
        start += cluster.len();
        rest = remainder;
    }
    ranges
}

#[cfg(test)]
mod tests {
    use super::*;
    use casemix_stays::{StayEntry, StayExit};
    use chrono::NaiveDate;

    fn date(d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2019, 4, d)
    }

    fn stay(bill_id: i32, entry_day: u32, exit_day: u32, entry_mode: u8, exit_mode: u8) -> Stay {
        Stay {
            bill_id,
            entry: StayEntry { date: date(entry_day), mode: entry_mode, origin: 0 },
            exit: StayExit { date: date(exit_day), mode: exit_mode, destination: 0 },
            ..Default::default()
        }
    }

    #[test]
    fn bill_id_change_cuts() {
        let stays = vec![
            stay(1, 1, 3, b'8', b'6'),
            stay(1, 3, 5, b'6', b'6'),
            stay(1, 5, 8, b'6', b'8'),
            stay(2, 9, 10, b'8', b'6'),
            stay(2, 10, 12, b'6', b'8'),
        ];
        let ranges = cluster_ranges(&stays);
        assert_eq!(ranges, vec![(0, 3), (3, 2)]);
    }

    #[test]
    fn death_cuts_even_with_same_bill() {
        let stays = vec![stay(1, 1, 3, b'8', b'9'), stay(1, 3, 5, b'6', b'8')];
        assert_eq!(cluster_ranges(&stays), vec![(0, 1), (1, 1)]);
    }

    #[test]
    fn next_day_gap_requires_mutation_mode() {
        // One-day gap with entry mode '6' continues.
        let stays = vec![stay(1, 1, 3, b'8', b'6'), stay(1, 4, 6, b'6', b'8')];
        assert_eq!(cluster_ranges(&stays), vec![(0, 2)]);

        // One-day gap with entry mode '7' cuts.
        let mut second = stay(1, 4, 6, b'7', b'8');
        second.entry.origin = b'1';
        let stays = vec![stay(1, 1, 3, b'8', b'6'), second];
        assert_eq!(cluster_ranges(&stays), vec![(0, 1), (1, 1)]);

        // Two-day gap always cuts.
        let stays = vec![stay(1, 1, 3, b'8', b'6'), stay(1, 5, 6, b'6', b'8')];
        assert_eq!(cluster_ranges(&stays), vec![(0, 1), (1, 1)]);
    }

    #[test]
    fn external_transfer_exit_cuts() {
        let mut first = stay(1, 1, 3, b'8', b'7');
        first.exit.destination = b'2';
        let stays = vec![first, stay(1, 3, 5, b'6', b'8')];
        assert_eq!(cluster_ranges(&stays), vec![(0, 1), (1, 1)]);
    }

    #[test]
    fn non_continuation_entry_cuts() {
        let stays = vec![stay(1, 1, 3, b'8', b'6'), stay(1, 3, 5, b'8', b'8')];
        assert_eq!(cluster_ranges(&stays), vec![(0, 1), (1, 1)]);
    }
}
