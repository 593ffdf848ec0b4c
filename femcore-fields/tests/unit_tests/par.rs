use super::{bilinear_monomial, identity2, points2};
use femcore_fields::par::ParFieldEvaluator;
use femcore_fields::{dot, CachedArray};
use proptest::prelude::*;

proptest! {
    #[test]
    fn parallel_evaluation_agrees_with_sequential(xs in points2()) {
        let id = identity2();
        let field = &bilinear_monomial() + &dot(&id, &id);
        let evaluator = ParFieldEvaluator::new(field.clone());

        let sequential = field.evaluate_all(&xs).unwrap();
        let parallel = evaluator.evaluate_all(&xs).unwrap();
        prop_assert_eq!(&parallel, &sequential);

        // Reusing the output buffer for a shorter batch
        let mut values = CachedArray::default();
        evaluator.evaluate_batch(&xs, &mut values).unwrap();
        let half = &xs[..xs.len() / 2];
        evaluator.evaluate_batch(half, &mut values).unwrap();
        prop_assert_eq!(values.as_slice(), &sequential[..half.len()]);
    }
}
