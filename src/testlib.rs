use regex::Regex;
use std::{fmt::Debug, iter::zip};

pub fn assert_re(pattern: &str, haystack: &str) {
    let re = Regex::new(pattern).unwrap();
    assert!(re.is_match(haystack), "{:?} did not match {:?}", haystack, re);
}

/// For solver output (rates), which is only reproducible up to tolerance.
pub fn assert_approx_eq(left: f64, right: f64, tolerance: f64) {
    assert!(
        (left - right).abs() <= tolerance,
        "{} != {} (tolerance {})",
        left,
        right,
        tolerance
    );
}

fn eprint_vecs<T: PartialEq + Debug>(left: &[T], right: &[T]) {
    let mut err_str = "left != right. left: [\n".to_string();
    for o in left {
        err_str += &format!("{:?},\n", o);
    }
    err_str += "] != right: [\n";
    for o in right {
        err_str += &format!("{:?},\n", o);
    }
    eprintln!("{}", err_str);
}

pub fn assert_big_struct_eq<T: PartialEq + Debug>(left: T, right: T) {
    assert_eq!(left, right, "{:#?} != {:#?}", left, right);
}

pub fn assert_vec_eq<T: PartialEq + Debug>(left: Vec<T>, right: Vec<T>) {
    assert_vecr_eq(&left, &right);
}

pub fn assert_vecr_eq<T: PartialEq + Debug>(left: &[T], right: &[T]) {
    if left == right {
        return;
    }
    eprint_vecs(left, right);

    if left.len() != right.len() {
        eprintln!("size of left ({}) != size of right ({})", left.len(), right.len());
        panic!();
    }
    for (i, (l, r)) in zip(left, right).enumerate() {
        if l != r {
            eprintln!("Mismatch at index {}:", i);
            eprintln!("left: {:#?} != right: {:#?}", l, r);
        }
    }
    panic!();
}
