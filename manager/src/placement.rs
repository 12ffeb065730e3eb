use storage::{BucketHandle, Region};

// Approximate km, each unordered pair once.
const DISTANCES: &[(Region, Region, u32)] = &[
    (Region::UsEast, Region::UsWest, 2500),
    (Region::UsEast, Region::Eu, 4000),
    (Region::UsEast, Region::Asia, 7000),
    (Region::UsEast, Region::LatinAmerica, 1500),
    (Region::UsEast, Region::Africa, 6000),
    (Region::UsEast, Region::Australia, 9000),
    (Region::UsWest, Region::Eu, 3500),
    (Region::UsWest, Region::Asia, 6500),
    (Region::UsWest, Region::LatinAmerica, 2000),
    (Region::UsWest, Region::Africa, 5500),
    (Region::UsWest, Region::Australia, 8500),
    (Region::Eu, Region::Asia, 6000),
    (Region::Eu, Region::LatinAmerica, 5000),
    (Region::Eu, Region::Africa, 2000),
    (Region::Eu, Region::Australia, 8000),
    (Region::Asia, Region::LatinAmerica, 11000),
    (Region::Asia, Region::Africa, 5000),
    (Region::Asia, Region::Australia, 3000),
    (Region::LatinAmerica, Region::Africa, 4000),
    (Region::LatinAmerica, Region::Australia, 12000),
    (Region::Africa, Region::Australia, 7000),
];

pub fn distance(from: Region, to: Region) -> Option<u32> {
    if from == to {
        return Some(0);
    }

    DISTANCES
        .iter()
        .find(|(a, b, _)| (*a == from && *b == to) || (*a == to && *b == from))
        .map(|(_, _, km)| *km)
}

#[derive(Debug, Clone, Copy)]
pub struct Selection<'a> {
    pub region: Region,
    pub required: u64,
    pub exclude: Option<&'a str>,
}

impl<'a> Selection<'a> {
    pub fn new(region: Region, required: u64) -> Self {
        Self {
            region,
            required,
            exclude: None,
        }
    }

    pub fn excluding(mut self, id: &'a str) -> Self {
        self.exclude = Some(id);
        self
    }

    fn admits(&self, bucket: &BucketHandle) -> bool {
        let fits = u64::try_from(bucket.available_space())
            .map(|available| available >= self.required)
            .unwrap_or(false);
        fits && self.exclude != Some(bucket.id.as_str())
    }
}

/// Candidates that can hold the payload, nearest first. Ties keep their order.
pub fn rank<'b>(buckets: &'b [BucketHandle], selection: &Selection<'_>) -> Vec<&'b BucketHandle> {
    let mut candidates: Vec<&BucketHandle> = buckets
        .iter()
        .filter(|bucket| selection.admits(bucket))
        .collect();

    candidates.sort_by_key(|bucket| distance(selection.region, bucket.region).unwrap_or(u32::MAX));
    candidates
}

pub fn select_bucket<'b>(
    buckets: &'b [BucketHandle],
    selection: &Selection<'_>,
) -> Option<&'b BucketHandle> {
    rank(buckets, selection).into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use storage::BucketSpec;

    fn bucket(id: &str, region: Region, available: i64) -> BucketHandle {
        BucketHandle::new(id, "localhost", 3001, region, format!("/data/{}", id))
            .with_spec(BucketSpec::with_capacity(available))
    }

    #[test]
    fn test_distance_is_symmetric_and_complete() {
        for a in Region::ALL {
            for b in Region::ALL {
                assert_eq!(distance(a, b), distance(b, a));
                assert!(distance(a, b).is_some(), "{} -> {}", a, b);
            }
        }
        assert_eq!(distance(Region::LatinAmerica, Region::UsEast), Some(1500));
        assert_eq!(distance(Region::Australia, Region::Asia), Some(3000));
        assert_eq!(distance(Region::Eu, Region::Eu), Some(0));
    }

    #[test]
    fn test_nearest_bucket_from_latin_america() {
        let buckets = vec![
            bucket("asia", Region::Asia, 1_000),
            bucket("eu", Region::Eu, 1_000),
            bucket("us-east", Region::UsEast, 1_000),
        ];

        let selection = Selection::new(Region::LatinAmerica, 100);
        let primary = select_bucket(&buckets, &selection).unwrap();
        assert_eq!(primary.id, "us-east");

        let backup = select_bucket(&buckets, &selection.excluding(&primary.id)).unwrap();
        assert_eq!(backup.id, "eu");
    }

    #[test]
    fn test_full_buckets_are_skipped() {
        let buckets = vec![
            bucket("near", Region::UsEast, 50),
            bucket("far", Region::Australia, 500),
        ];

        let selection = Selection::new(Region::LatinAmerica, 100);
        assert_eq!(select_bucket(&buckets, &selection).unwrap().id, "far");
        assert!(select_bucket(&buckets, &Selection::new(Region::LatinAmerica, 501)).is_none());
    }

    #[test]
    fn test_exact_fit_and_unannounced_buckets() {
        let silent = BucketHandle::new("silent", "localhost", 3002, Region::UsEast, "/data/silent");
        let buckets = vec![silent, bucket("exact", Region::Eu, 100)];

        let chosen = select_bucket(&buckets, &Selection::new(Region::UsEast, 100)).unwrap();
        assert_eq!(chosen.id, "exact");
        assert_eq!(
            select_bucket(&buckets, &Selection::new(Region::UsEast, 0)).unwrap().id,
            "silent"
        );
    }

    #[test]
    fn test_same_region_ranks_first_and_ties_keep_order() {
        let buckets = vec![
            bucket("eu-1", Region::Eu, 1_000),
            bucket("africa", Region::Africa, 1_000),
            bucket("eu-2", Region::Eu, 1_000),
        ];

        let ranked: Vec<&str> = rank(&buckets, &Selection::new(Region::Eu, 1))
            .into_iter()
            .map(|b| b.id.as_str())
            .collect();
        assert_eq!(ranked, vec!["eu-1", "eu-2", "africa"]);
    }

    fn region() -> impl Strategy<Value = Region> {
        prop::sample::select(Region::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn prop_selection_is_nearest_fitting_bucket(
            origin in region(),
            required in 0u64..2_000,
            layout in prop::collection::vec((region(), -10i64..2_000), 0..12),
        ) {
            let buckets: Vec<BucketHandle> = layout
                .iter()
                .enumerate()
                .map(|(i, (region, available))| bucket(&format!("b-{}", i), *region, *available))
                .collect();
            let selection = Selection::new(origin, required);

            match select_bucket(&buckets, &selection) {
                Some(chosen) => {
                    prop_assert!(chosen.available_space() >= required as i64);
                    let best = distance(origin, chosen.region).unwrap();
                    for other in buckets.iter().filter(|b| b.available_space() >= required as i64) {
                        prop_assert!(best <= distance(origin, other.region).unwrap());
                    }

                    if let Some(backup) = select_bucket(&buckets, &selection.excluding(&chosen.id)) {
                        prop_assert_ne!(&backup.id, &chosen.id);
                    }
                }
                None => {
                    prop_assert!(buckets.iter().all(|b| b.available_space() < required as i64));
                }
            }
        }
    }
}
