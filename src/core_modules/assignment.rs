// THEORY:
// The assignment module gives the output channels identity over time. Every
// analysis cycle produces a fresh, unordered set of dominant hues; if those
// were handed to the channels in extraction order, two similarly heavy
// clusters could swap channels from one frame to the next and the fixture
// would visibly flicker between them. The fix is the classic data-association
// move: build a cost matrix between what each channel currently shows and
// what the scene currently offers, then solve the minimum-cost one-to-one
// matching exactly.
//
// The cost of giving a cluster to a channel combines three signals:
// - distance between the channel's currently emitted hue and the cluster hue
//   (dominant term: channels should keep showing what they already show),
// - a small bias toward the hue the channel was assigned last cycle, which
//   breaks ties before they can oscillate,
// - attenuation by the squared cluster weight, so heavy clusters are cheap
//   for everyone and always find a channel.
//
// The matrix is solved with the Hungarian algorithm. The channel count is
// tiny, so the cubic solve costs next to nothing per round; what matters is
// that the matching is optimal, because a merely greedy matching re-creates
// exactly the frame-to-frame swaps this module exists to prevent.

use crate::core_modules::cluster::HueCluster;
use crate::core_modules::color::{Hue, hue_distance};

/// Cost of a padding column. Dominates every real cost, so padding is only
/// chosen when there are fewer clusters than channels. Kept small enough that
/// potentials stay well inside f64 precision.
const DUMMY_COST: f64 = 1e9;
/// Real costs are capped below the padding cost; near-zero cluster weights
/// would otherwise blow past it.
const MAX_REAL_COST: f64 = 1e6;

/// A channel's newly assigned target hue and weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssignedTarget {
    pub hue: Hue,
    pub weight: f64,
}

/// Matches each cycle's clusters to the fixed output channels.
pub struct ChannelAssigner {
    channel_count: usize,
    /// Weight of the last-assigned-hue tie-breaker term.
    continuity_bias: f64,
    /// Constant added to every real cost before weight attenuation.
    base_cost: f64,
    last_assigned_hues: Vec<Hue>,
}

impl ChannelAssigner {
    pub fn new(channel_count: usize, continuity_bias: f64, base_cost: f64) -> Self {
        Self {
            channel_count,
            continuity_bias,
            base_cost,
            last_assigned_hues: vec![0.0; channel_count],
        }
    }

    /// Assigns at most one cluster to every channel.
    ///
    /// `emitted_hues` are the hues the channels are currently showing. The
    /// result has one entry per channel; `None` means no cluster was left for
    /// that channel and it should keep its previous target.
    pub fn assign(
        &mut self,
        clusters: &[HueCluster],
        emitted_hues: &[Hue],
    ) -> Vec<Option<AssignedTarget>> {
        let n = self.channel_count;
        debug_assert_eq!(emitted_hues.len(), n);
        if clusters.is_empty() {
            return vec![None; n];
        }
        let clusters = &clusters[..clusters.len().min(n)];

        let mut cost = vec![vec![DUMMY_COST; n]; n];
        for (channel, row) in cost.iter_mut().enumerate() {
            for (column, cluster) in clusters.iter().enumerate() {
                let weight = cluster.weight.max(f64::EPSILON);
                let raw = (hue_distance(self.last_assigned_hues[channel], cluster.hue) as f64
                    * self.continuity_bias
                    + hue_distance(emitted_hues[channel], cluster.hue) as f64
                    + self.base_cost)
                    / (weight * weight);
                row[column] = raw.min(MAX_REAL_COST);
            }
        }

        let assignment = solve_assignment(&cost);
        let mut targets = Vec::with_capacity(n);
        for channel in 0..n {
            let column = assignment[channel];
            if column < clusters.len() {
                let cluster = clusters[column];
                self.last_assigned_hues[channel] = cluster.hue;
                targets.push(Some(AssignedTarget {
                    hue: cluster.hue,
                    weight: cluster.weight,
                }));
            } else {
                targets.push(None);
            }
        }
        targets
    }
}

/// Solves the minimum-cost perfect assignment on a square cost matrix and
/// returns the column chosen for each row. Hungarian algorithm with row and
/// column potentials, O(n³).
pub fn solve_assignment(cost: &[Vec<f64>]) -> Vec<usize> {
    let n = cost.len();
    // 1-indexed working arrays; index 0 is the virtual unmatched slot.
    let mut row_potential = vec![0.0; n + 1];
    let mut column_potential = vec![0.0; n + 1];
    let mut matched_row = vec![0usize; n + 1];
    let mut predecessor = vec![0usize; n + 1];

    for row in 1..=n {
        matched_row[0] = row;
        let mut current_column = 0usize;
        let mut min_slack = vec![f64::INFINITY; n + 1];
        let mut visited = vec![false; n + 1];

        loop {
            visited[current_column] = true;
            let current_row = matched_row[current_column];
            let mut delta = f64::INFINITY;
            let mut next_column = 0usize;

            for column in 1..=n {
                if visited[column] {
                    continue;
                }
                let slack = cost[current_row - 1][column - 1]
                    - row_potential[current_row]
                    - column_potential[column];
                if slack < min_slack[column] {
                    min_slack[column] = slack;
                    predecessor[column] = current_column;
                }
                if min_slack[column] < delta {
                    delta = min_slack[column];
                    next_column = column;
                }
            }

            for column in 0..=n {
                if visited[column] {
                    row_potential[matched_row[column]] += delta;
                    column_potential[column] -= delta;
                } else {
                    min_slack[column] -= delta;
                }
            }

            current_column = next_column;
            if matched_row[current_column] == 0 {
                break;
            }
        }

        // Walk the augmenting path backwards, flipping matches.
        while current_column != 0 {
            let previous_column = predecessor[current_column];
            matched_row[current_column] = matched_row[previous_column];
            current_column = previous_column;
        }
    }

    let mut assignment = vec![0usize; n];
    for column in 1..=n {
        if matched_row[column] > 0 {
            assignment[matched_row[column] - 1] = column - 1;
        }
    }
    assignment
}

#[cfg(test)]
mod tests {
    use super::*;

    fn permutations(n: usize) -> Vec<Vec<usize>> {
        if n == 1 {
            return vec![vec![0]];
        }
        let mut result = Vec::new();
        for shorter in permutations(n - 1) {
            for position in 0..n {
                let mut longer = shorter.clone();
                longer.insert(position, n - 1);
                result.push(longer);
            }
        }
        result
    }

    fn total_cost(cost: &[Vec<f64>], assignment: &[usize]) -> f64 {
        assignment
            .iter()
            .enumerate()
            .map(|(row, &column)| cost[row][column])
            .sum()
    }

    #[test]
    fn solver_matches_brute_force_on_small_matrices() {
        let matrices: Vec<Vec<Vec<f64>>> = vec![
            vec![vec![4.0, 1.0, 3.0], vec![2.0, 0.0, 5.0], vec![3.0, 2.0, 2.0]],
            vec![
                vec![9.0, 11.0, 14.0, 11.0],
                vec![6.0, 15.0, 13.0, 13.0],
                vec![12.0, 13.0, 6.0, 8.0],
                vec![11.0, 9.0, 10.0, 12.0],
            ],
            vec![
                vec![0.5, 0.5, 0.9, 0.1],
                vec![0.5, 0.5, 0.1, 0.9],
                vec![0.3, 0.3, 0.3, 0.3],
                vec![0.01, 0.02, 0.03, 0.04],
            ],
        ];
        for cost in matrices {
            let solved = solve_assignment(&cost);
            let solved_cost = total_cost(&cost, &solved);
            let best = permutations(cost.len())
                .into_iter()
                .map(|p| total_cost(&cost, &p))
                .fold(f64::INFINITY, f64::min);
            assert!(
                (solved_cost - best).abs() < 1e-9,
                "solver found {solved_cost}, brute force found {best}"
            );
        }
    }

    #[test]
    fn solver_result_is_a_permutation() {
        let cost = vec![
            vec![1.0, 2.0, 3.0],
            vec![3.0, 1.0, 2.0],
            vec![2.0, 3.0, 1.0],
        ];
        let mut assignment = solve_assignment(&cost);
        assignment.sort_unstable();
        assert_eq!(assignment, vec![0, 1, 2]);
    }

    #[test]
    fn channels_keep_their_hues_when_cluster_order_flips() {
        let mut assigner = ChannelAssigner::new(2, 0.01, 0.1);
        let emitted = [0.1, 0.6];

        let clusters = [
            HueCluster { hue: 0.62, weight: 0.5 },
            HueCluster { hue: 0.08, weight: 0.5 },
        ];
        let targets = assigner.assign(&clusters, &emitted);
        assert_eq!(targets[0].unwrap().hue, 0.08);
        assert_eq!(targets[1].unwrap().hue, 0.62);

        // Same clusters in the opposite order: the channels must not swap.
        let flipped = [
            HueCluster { hue: 0.08, weight: 0.5 },
            HueCluster { hue: 0.62, weight: 0.5 },
        ];
        let targets = assigner.assign(&flipped, &emitted);
        assert_eq!(targets[0].unwrap().hue, 0.08);
        assert_eq!(targets[1].unwrap().hue, 0.62);
    }

    #[test]
    fn missing_clusters_leave_channels_unassigned() {
        let mut assigner = ChannelAssigner::new(3, 0.01, 0.1);
        let clusters = [HueCluster { hue: 0.25, weight: 0.9 }];
        let targets = assigner.assign(&clusters, &[0.25, 0.5, 0.75]);
        let assigned: Vec<bool> = targets.iter().map(|t| t.is_some()).collect();
        assert_eq!(assigned.iter().filter(|&&a| a).count(), 1);
        // The channel already showing the cluster's hue wins it.
        assert_eq!(targets[0].unwrap().hue, 0.25);
        assert!(targets[1].is_none());
        assert!(targets[2].is_none());
    }

    #[test]
    fn empty_cluster_list_changes_nothing() {
        let mut assigner = ChannelAssigner::new(2, 0.01, 0.1);
        let targets = assigner.assign(&[], &[0.0, 0.5]);
        assert!(targets.iter().all(|t| t.is_none()));
    }
}
