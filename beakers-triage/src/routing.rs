//! Routing state machine
//!
//! Maps a validated score vector to a route. Rules are evaluated in order and
//! the first match wins:
//!
//! 1. reject  if T <= 1, or H >= 4 with E <= 3
//! 2. indepth if E >= 4, T >= 4, S or M >= 4, H <= 2
//! 3. digest  if E >= 3, T >= 3, S or M >= 3, H <= 3
//! 4. blurb   if T >= 2, S or M >= 3 (frontier when E <= 2)
//! 5. reject  otherwise
//!
//! The frontier flag is only ever set on blurbs.

use crate::models::{Route, ScoreVector};
use serde::{Deserialize, Serialize};

/// Route plus frontier flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDecision {
    pub route: Route,
    pub frontier: bool,
}

impl RouteDecision {
    fn plain(route: Route) -> Self {
        Self {
            route,
            frontier: false,
        }
    }
}

/// Route a score vector
pub fn route(scores: &ScoreVector) -> RouteDecision {
    let [s, e, t, m, h] = scores.as_array();

    if t <= 1 || (h >= 4 && e <= 3) {
        return RouteDecision::plain(Route::Reject);
    }

    if e >= 4 && t >= 4 && (s >= 4 || m >= 4) && h <= 2 {
        return RouteDecision::plain(Route::Indepth);
    }

    if e >= 3 && t >= 3 && (s >= 3 || m >= 3) && h <= 3 {
        return RouteDecision::plain(Route::Digest);
    }

    if t >= 2 && (s >= 3 || m >= 3) {
        return RouteDecision {
            route: Route::Blurb,
            frontier: e <= 2,
        };
    }

    RouteDecision::plain(Route::Reject)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Score;

    fn v(s: i64, e: i64, t: i64, m: i64, h: i64) -> ScoreVector {
        ScoreVector::from_raw(s, e, t, m, h).unwrap()
    }

    fn lattice() -> impl Iterator<Item = ScoreVector> {
        Score::all().flat_map(|s| {
            Score::all().flat_map(move |e| {
                Score::all().flat_map(move |t| {
                    Score::all().flat_map(move |m| {
                        Score::all().map(move |h| ScoreVector { s, e, t, m, h })
                    })
                })
            })
        })
    }

    #[test]
    fn test_fixture_vectors() {
        assert_eq!(route(&v(5, 5, 5, 5, 0)), RouteDecision::plain(Route::Indepth));
        assert_eq!(route(&v(0, 0, 0, 0, 5)), RouteDecision::plain(Route::Reject));
        assert_eq!(
            route(&v(3, 1, 3, 0, 1)),
            RouteDecision {
                route: Route::Blurb,
                frontier: true
            }
        );
        assert_eq!(route(&v(0, 0, 0, 0, 0)), RouteDecision::plain(Route::Reject));
    }

    #[test]
    fn test_rule_order() {
        // Hype with weak evidence rejects even when everything else is strong
        assert_eq!(route(&v(5, 3, 5, 5, 4)).route, Route::Reject);
        // Strong evidence tolerates hype 4 but falls through to blurb
        assert_eq!(route(&v(5, 4, 5, 5, 4)).route, Route::Blurb);
        // H = 3 blocks indepth, permits digest
        assert_eq!(route(&v(5, 5, 5, 5, 3)).route, Route::Digest);
        // media affordance alone qualifies
        assert_eq!(route(&v(0, 4, 4, 4, 0)).route, Route::Indepth);
        // T = 1 always rejects
        assert_eq!(route(&v(5, 5, 1, 5, 0)).route, Route::Reject);
        // Blurb with E = 3 is not frontier
        assert_eq!(route(&v(3, 3, 2, 0, 0)), RouteDecision::plain(Route::Blurb));
        // Neither S nor M reaches 3
        assert_eq!(route(&v(2, 5, 5, 2, 0)).route, Route::Reject);
    }

    #[test]
    fn test_total_over_lattice() {
        let mut count = 0;
        for scores in lattice() {
            let decision = route(&scores);
            count += 1;

            if decision.frontier {
                assert_eq!(decision.route, Route::Blurb, "{}", scores);
                assert!(scores.e.value() <= 2, "{}", scores);
            }
            if decision.route == Route::Blurb && scores.e.value() <= 2 {
                assert!(decision.frontier, "{}", scores);
            }
        }
        assert_eq!(count, 6usize.pow(5));
    }

    #[test]
    fn test_pure() {
        for scores in lattice() {
            assert_eq!(route(&scores), route(&scores));
        }
    }
}
