use rand::Rng;

/// In-place Fisher-Yates: walking down from the last index, swap `i` with a
/// uniformly chosen `j` in `[0, i]`.
pub fn shuffle<T, R>(items: &mut [T], rng: &mut R)
where
    R: Rng + ?Sized,
{
    for i in (1..items.len()).rev() {
        let j = rng.random_range(0..=i);
        items.swap(i, j);
    }
}

/// A random permutation of `0..len`, for flashcard shuffle mode.
pub fn shuffled_order<R>(len: usize, rng: &mut R) -> Vec<usize>
where
    R: Rng + ?Sized,
{
    let mut order: Vec<usize> = (0..len).collect();
    shuffle(&mut order, rng);
    order
}
