//! Result-shape unification for branch ladders.

use crate::config::PartialBranchResults;
use crate::shape::Shape;

/// How one arm of a branch ladder finished.
#[derive(Debug, Clone, PartialEq)]
pub enum ArmOutcome {
    /// The arm produced a value of this shape.
    Value(Shape),
    /// The arm completed without a value.
    Nothing,
    /// The arm raised a declared failure; it never reaches the join point.
    Raised,
}

/// Shape of the shared result variable, or `None` when no arm produces a
/// value.
///
/// Distinct shapes are merged by equality: a single distinct shape is kept
/// as is, several become a union. Under [`PartialBranchResults::Nullable`]
/// arms that yield nothing add the absent member.
pub fn unify(outcomes: &[ArmOutcome], policy: PartialBranchResults) -> Option<Shape> {
    let mut distinct: Vec<Shape> = Vec::new();
    for outcome in outcomes {
        if let ArmOutcome::Value(shape) = outcome {
            if !distinct.contains(shape) {
                distinct.push(shape.clone());
            }
        }
    }
    if distinct.is_empty() {
        return None;
    }
    let merged = if distinct.len() == 1 {
        distinct.remove(0)
    } else {
        Shape::union(distinct)
    };
    let partial = outcomes.iter().any(|outcome| *outcome == ArmOutcome::Nothing);
    Some(match policy {
        PartialBranchResults::Nullable if partial => Shape::nullable(merged),
        _ => merged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::RecordShape;
    use indexmap::IndexMap;
    use proptest::prelude::*;

    fn user() -> Shape {
        Shape::Record(RecordShape::named("User", IndexMap::new()))
    }

    #[test]
    fn all_nothing_has_no_result() {
        let outcomes = [ArmOutcome::Nothing, ArmOutcome::Nothing];
        assert_eq!(unify(&outcomes, PartialBranchResults::Nullable), None);
        assert_eq!(unify(&[], PartialBranchResults::Exact), None);
    }

    #[test]
    fn record_or_nothing_is_a_nullable_record() {
        let outcomes = [ArmOutcome::Value(user()), ArmOutcome::Nothing];
        let shape = unify(&outcomes, PartialBranchResults::Nullable).unwrap();
        assert!(shape.is_nullable());
        assert_eq!(shape.without_nothing(), Some(user()));
        assert_eq!(
            unify(&outcomes, PartialBranchResults::Exact),
            Some(user())
        );
    }

    #[test]
    fn raised_arms_do_not_widen_the_result() {
        let outcomes = [ArmOutcome::Value(Shape::String), ArmOutcome::Raised];
        assert_eq!(
            unify(&outcomes, PartialBranchResults::Nullable),
            Some(Shape::String)
        );
    }

    #[test]
    fn distinct_shapes_become_a_union() {
        let outcomes = [
            ArmOutcome::Value(Shape::String),
            ArmOutcome::Value(Shape::Integer),
            ArmOutcome::Value(Shape::String),
        ];
        assert_eq!(
            unify(&outcomes, PartialBranchResults::Exact),
            Some(Shape::union([Shape::String, Shape::Integer]))
        );
    }

    fn scalar() -> impl Strategy<Value = Shape> {
        prop_oneof![
            Just(Shape::String),
            Just(Shape::Integer),
            Just(Shape::Float),
            Just(Shape::Boolean),
            Just(Shape::Timestamp),
            Just(Shape::list(Shape::String)),
        ]
    }

    fn outcome() -> impl Strategy<Value = ArmOutcome> {
        prop_oneof![
            4 => scalar().prop_map(ArmOutcome::Value),
            1 => Just(ArmOutcome::Nothing),
            1 => Just(ArmOutcome::Raised),
        ]
    }

    proptest! {
        #[test]
        fn single_shape_is_kept(shape in scalar(), arms in 1usize..6) {
            let outcomes = vec![ArmOutcome::Value(shape.clone()); arms];
            prop_assert_eq!(unify(&outcomes, PartialBranchResults::Nullable), Some(shape));
        }

        #[test]
        fn order_does_not_matter(outcomes in prop::collection::vec(outcome(), 0..8)) {
            let mut reversed = outcomes.clone();
            reversed.reverse();
            for policy in [PartialBranchResults::Nullable, PartialBranchResults::Exact] {
                prop_assert_eq!(unify(&outcomes, policy), unify(&reversed, policy));
            }
        }

        #[test]
        fn result_admits_every_produced_shape(outcomes in prop::collection::vec(outcome(), 0..8)) {
            let produced: Vec<&Shape> = outcomes
                .iter()
                .filter_map(|o| match o {
                    ArmOutcome::Value(shape) => Some(shape),
                    _ => None,
                })
                .collect();
            match unify(&outcomes, PartialBranchResults::Exact) {
                None => prop_assert!(produced.is_empty()),
                Some(Shape::Union(members)) => {
                    for shape in produced {
                        prop_assert!(members.contains(shape));
                    }
                }
                Some(single) => {
                    for shape in produced {
                        prop_assert_eq!(shape, &single);
                    }
                }
            }
        }

        #[test]
        fn nullable_exactly_when_some_arm_is_empty(outcomes in prop::collection::vec(outcome(), 1..8)) {
            let any_value = outcomes.iter().any(|o| matches!(o, ArmOutcome::Value(_)));
            let any_nothing = outcomes.contains(&ArmOutcome::Nothing);
            let unified = unify(&outcomes, PartialBranchResults::Nullable);
            prop_assert_eq!(unified.is_some(), any_value);
            if let Some(shape) = unified {
                prop_assert_eq!(shape.is_nullable(), any_nothing);
            }
        }
    }
}
