//! Non-dominated sorting of candidate solutions.

/// Whether `a` dominates `b`, with every objective minimised
pub fn dominates(a: &[f64], b: &[f64]) -> bool {
    let mut strictly_better = false;
    for (x, y) in a.iter().zip(b) {
        if x > y {
            return false;
        }
        strictly_better |= x < y;
    }

    strictly_better
}

/// Assign each point to a Pareto front.
///
/// Front 0 holds the points no other point dominates, front 1 those dominated only by points in
/// front 0, and so on.
///
/// # Arguments
///
/// * `objectives` - The objective vector for each point, with every objective minimised
///
/// # Returns
///
/// The front index of each point, in the same order as `objectives`.
pub fn pareto_fronts(objectives: &[Vec<f64>]) -> Vec<usize> {
    let n = objectives.len();
    let mut dominated_by = vec![0usize; n];
    let mut dominating: Vec<Vec<usize>> = vec![Vec::new(); n];
    for i in 0..n {
        for j in (i + 1)..n {
            if dominates(&objectives[i], &objectives[j]) {
                dominating[i].push(j);
                dominated_by[j] += 1;
            } else if dominates(&objectives[j], &objectives[i]) {
                dominating[j].push(i);
                dominated_by[i] += 1;
            }
        }
    }

    let mut fronts = vec![0usize; n];
    let mut current: Vec<usize> = (0..n).filter(|i| dominated_by[*i] == 0).collect();
    let mut front = 0;
    while !current.is_empty() {
        let mut next = Vec::new();
        for &i in &current {
            fronts[i] = front;
            for &j in &dominating[i] {
                dominated_by[j] -= 1;
                if dominated_by[j] == 0 {
                    next.push(j);
                }
            }
        }
        current = next;
        front += 1;
    }

    fronts
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&[1.0, 1.0], &[2.0, 2.0], true)]
    #[case(&[1.0, 2.0], &[1.0, 3.0], true)]
    #[case(&[1.0, 1.0], &[1.0, 1.0], false)]
    #[case(&[1.0, 3.0], &[2.0, 2.0], false)]
    fn test_dominates(#[case] a: &[f64], #[case] b: &[f64], #[case] expected: bool) {
        assert_eq!(dominates(a, b), expected);
    }

    #[test]
    fn test_pareto_fronts() {
        let objectives = vec![
            vec![1.0, 4.0],
            vec![2.0, 2.0],
            vec![4.0, 1.0],
            vec![3.0, 3.0],
            vec![4.0, 4.0],
            vec![2.0, 2.0],
        ];
        assert_eq!(pareto_fronts(&objectives), [0, 0, 0, 1, 2, 0]);
    }

    #[test]
    fn test_pareto_fronts_single_objective() {
        let objectives = vec![vec![3.0], vec![1.0], vec![2.0], vec![f64::INFINITY]];
        assert_eq!(pareto_fronts(&objectives), [2, 0, 1, 3]);
    }

    #[test]
    fn test_pareto_fronts_empty() {
        assert!(pareto_fronts(&[]).is_empty());
    }
}
