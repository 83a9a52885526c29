//! Summary statistics over branch lengths.

use std::fmt::Display;

use accurate::sum::NaiveSum;
use accurate::traits::*;

use crate::tree::EdgeLength;

/// Summary of a list of branch lengths. The variance is the population
/// variance of the list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchStats {
    /// Number of branches
    pub count: usize,
    /// Shortest branch
    pub min: EdgeLength,
    /// Longest branch
    pub max: EdgeLength,
    /// Total length of the branches
    pub total: EdgeLength,
    /// Mean branch length
    pub mean: EdgeLength,
    /// Median branch length
    pub median: EdgeLength,
    /// Population variance of the branch lengths
    pub variance: EdgeLength,
    /// Standard deviation of the branch lengths
    pub stdev: EdgeLength,
}

impl BranchStats {
    /// Computes the statistics of a list of branch lengths, `None` if the
    /// list is empty.
    /// ```
    /// use phylotopo::stats::BranchStats;
    ///
    /// let stats = BranchStats::from_lengths(&[1.0, 4.0, 2.0, 3.0]).unwrap();
    /// assert_eq!(stats.min, 1.0);
    /// assert_eq!(stats.max, 4.0);
    /// assert_eq!(stats.mean, 2.5);
    /// assert_eq!(stats.median, 2.5);
    /// assert_eq!(stats.variance, 1.25);
    ///
    /// assert!(BranchStats::from_lengths(&[]).is_none());
    /// ```
    pub fn from_lengths(lengths: &[EdgeLength]) -> Option<Self> {
        if lengths.is_empty() {
            return None;
        }

        let mut sorted = lengths.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let count = sorted.len();

        let mut total = NaiveSum::zero();
        for length in sorted.iter() {
            total += *length;
        }
        let total = total.sum();
        let mean = total / count as EdgeLength;

        let mut squares = NaiveSum::zero();
        for length in sorted.iter() {
            squares += (length - mean).powi(2);
        }
        let variance = squares.sum() / count as EdgeLength;

        let median = if count % 2 == 0 {
            (sorted[count / 2 - 1] + sorted[count / 2]) / 2.0
        } else {
            sorted[count / 2]
        };

        Some(Self {
            count,
            min: sorted[0],
            max: sorted[count - 1],
            total,
            mean,
            median,
            variance,
            stdev: variance.sqrt(),
        })
    }
}

impl Display for BranchStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "branches\t{}", self.count)?;
        writeln!(f, "total\t{}", self.total)?;
        writeln!(f, "min\t{}", self.min)?;
        writeln!(f, "max\t{}", self.max)?;
        writeln!(f, "mean\t{}", self.mean)?;
        writeln!(f, "median\t{}", self.median)?;
        writeln!(f, "variance\t{}", self.variance)?;
        write!(f, "stdev\t{}", self.stdev)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_branch() {
        let stats = BranchStats::from_lengths(&[0.5]).unwrap();
        assert_eq!(stats.count, 1);
        assert_eq!(stats.min, 0.5);
        assert_eq!(stats.max, 0.5);
        assert_eq!(stats.median, 0.5);
        assert_eq!(stats.variance, 0.0);
        assert_eq!(stats.stdev, 0.0);
    }

    #[test]
    fn odd_number_of_branches() {
        let stats =
            BranchStats::from_lengths(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0, 1.0]).unwrap();
        assert_eq!(stats.count, 9);
        assert_eq!(stats.total, 41.0);
        assert_eq!(stats.median, 4.0);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 9.0);
    }

    #[test]
    fn spread() {
        let stats = BranchStats::from_lengths(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(stats.mean, 5.0);
        assert_eq!(stats.median, 4.5);
        assert_eq!(stats.variance, 4.0);
        assert_eq!(stats.stdev, 2.0);
    }

    #[test]
    fn tree_branches() {
        let tree = crate::tree::Tree::from_newick("((A:1,B:2):1,(C:1,D:1):3);").unwrap();
        let stats = BranchStats::from_lengths(&tree.branch_lengths().unwrap()).unwrap();
        assert_eq!(stats.count, 6);
        assert_eq!(stats.total, 9.0);
        assert_eq!(stats.median, 1.0);
        assert_eq!(stats.to_string().lines().next(), Some("branches\t6"));
    }
}
