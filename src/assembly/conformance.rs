//! Acceptance checks for [`Assembler`] implementations.
//!
//! The checks panic with a descriptive message on failure, so that they can be called directly
//! from tests of downstream assemblers.
use crate::assembly::assembler::{Assembler, GlobalMatrix, GlobalVector};
use crate::assembly::data::{AssemblyData, MatrixData, VectorData};
use femcore_traits::Real;
use nalgebra::DMatrix;

fn assert_close<T: Real>(actual: &[T], expected: &[T], context: &str) {
    assert_eq!(actual.len(), expected.len(), "{context}: size mismatch");
    let scale = expected.iter().fold(T::one(), |acc, x| acc.max(x.abs()));
    let tol = nalgebra::convert::<f64, T>(1.0e-12) * scale;
    for (a, e) in actual.iter().zip(expected) {
        assert!(
            (*a - *e).abs() <= tol,
            "{context}: entries differ ({a} vs. {e}, tolerance {tol})"
        );
    }
}

/// Runs every operation of `assembler` on `data` and checks that the results are consistent.
///
/// Verifies that
/// - allocated storage has the shape of the assembler, also for empty data,
/// - overwriting twice gives the same result as overwriting once,
/// - adding after overwriting doubles the result,
/// - one-shot assembly agrees with allocation followed by assembly,
/// - combined matrix and vector assembly agrees with separate assembly.
pub fn test_assembler<T, A>(assembler: &A, data: &AssemblyData<T>)
where
    T: Real,
    A: Assembler<T>,
{
    let shape = (assembler.num_rows(), assembler.num_cols());
    assert_eq!(assembler.rows().len(), shape.0, "rows and num_rows disagree");
    assert_eq!(assembler.cols().len(), shape.1, "cols and num_cols disagree");

    let (matrix_data, vector_data) = data.split();
    let empty = AssemblyData::empty();

    for (description, matrix_data) in [("empty", &MatrixData::empty()), ("given", &matrix_data)] {
        let matrix = assembler
            .allocate_matrix(matrix_data)
            .unwrap_or_else(|err| panic!("matrix allocation for {description} data failed: {err:?}"));
        assert_eq!(matrix.shape(), shape, "allocated matrix for {description} data has wrong shape");
        let zeros = DMatrix::<T>::zeros(shape.0, shape.1);
        assert_close(matrix.to_dense().as_slice(), zeros.as_slice(), "allocated matrix");
    }
    for (description, vector_data) in [("empty", &VectorData::empty()), ("given", &vector_data)] {
        let vector = assembler
            .allocate_vector(vector_data)
            .unwrap_or_else(|err| panic!("vector allocation for {description} data failed: {err:?}"));
        assert_eq!(vector.len(), shape.0, "allocated vector for {description} data has wrong length");
    }
    for (description, data) in [("empty", &empty), ("given", data)] {
        let (matrix, vector) = assembler
            .allocate_matrix_and_vector(data)
            .unwrap_or_else(|err| panic!("combined allocation for {description} data failed: {err:?}"));
        assert_eq!(matrix.shape(), shape, "combined matrix for {description} data has wrong shape");
        assert_eq!(vector.len(), shape.0, "combined vector for {description} data has wrong length");
    }

    // Matrices
    let mut matrix = assembler
        .allocate_matrix(&matrix_data)
        .expect("allocation succeeded above");
    assembler
        .assemble_matrix_into(&mut matrix, &matrix_data)
        .unwrap_or_else(|err| panic!("matrix assembly failed: {err:?}"));
    let once = matrix.to_dense();
    assembler
        .assemble_matrix_into(&mut matrix, &matrix_data)
        .unwrap_or_else(|err| panic!("repeated matrix assembly failed: {err:?}"));
    assert_close(matrix.to_dense().as_slice(), once.as_slice(), "repeated matrix assembly");
    assembler
        .assemble_matrix_add(&mut matrix, &matrix_data)
        .unwrap_or_else(|err| panic!("additive matrix assembly failed: {err:?}"));
    assert_close(
        matrix.to_dense().as_slice(),
        (&once * nalgebra::convert::<f64, T>(2.0)).as_slice(),
        "additive matrix assembly",
    );
    let one_shot = assembler
        .assemble_matrix(&matrix_data)
        .unwrap_or_else(|err| panic!("one-shot matrix assembly failed: {err:?}"));
    assert_close(one_shot.to_dense().as_slice(), once.as_slice(), "one-shot matrix assembly");

    // Vectors
    let mut vector = assembler
        .allocate_vector(&vector_data)
        .expect("allocation succeeded above");
    assembler
        .assemble_vector_into(&mut vector, &vector_data)
        .unwrap_or_else(|err| panic!("vector assembly failed: {err:?}"));
    let once_vector = vector.to_dense();
    assembler
        .assemble_vector_into(&mut vector, &vector_data)
        .unwrap_or_else(|err| panic!("repeated vector assembly failed: {err:?}"));
    assert_close(vector.to_dense().as_slice(), once_vector.as_slice(), "repeated vector assembly");
    assembler
        .assemble_vector_add(&mut vector, &vector_data)
        .unwrap_or_else(|err| panic!("additive vector assembly failed: {err:?}"));
    assert_close(
        vector.to_dense().as_slice(),
        (&once_vector * nalgebra::convert::<f64, T>(2.0)).as_slice(),
        "additive vector assembly",
    );
    let one_shot = assembler
        .assemble_vector(&vector_data)
        .unwrap_or_else(|err| panic!("one-shot vector assembly failed: {err:?}"));
    assert_close(one_shot.to_dense().as_slice(), once_vector.as_slice(), "one-shot vector assembly");

    // Combined
    let (mut matrix, mut vector) = assembler
        .allocate_matrix_and_vector(data)
        .expect("allocation succeeded above");
    for _ in 0..2 {
        assembler
            .assemble_matrix_and_vector_into(&mut matrix, &mut vector, data)
            .unwrap_or_else(|err| panic!("combined assembly failed: {err:?}"));
        assert_close(matrix.to_dense().as_slice(), once.as_slice(), "combined matrix assembly");
        assert_close(vector.to_dense().as_slice(), once_vector.as_slice(), "combined vector assembly");
    }
    assembler
        .assemble_matrix_and_vector_add(&mut matrix, &mut vector, data)
        .unwrap_or_else(|err| panic!("additive combined assembly failed: {err:?}"));
    assert_close(
        vector.to_dense().as_slice(),
        (&once_vector * nalgebra::convert::<f64, T>(2.0)).as_slice(),
        "additive combined vector assembly",
    );
    assert_close(
        matrix.to_dense().as_slice(),
        (&once * nalgebra::convert::<f64, T>(2.0)).as_slice(),
        "additive combined matrix assembly",
    );
    let (matrix, vector) = assembler
        .assemble_matrix_and_vector(data)
        .unwrap_or_else(|err| panic!("one-shot combined assembly failed: {err:?}"));
    assert_close(matrix.to_dense().as_slice(), once.as_slice(), "one-shot combined matrix assembly");
    assert_close(vector.to_dense().as_slice(), once_vector.as_slice(), "one-shot combined vector assembly");
}
