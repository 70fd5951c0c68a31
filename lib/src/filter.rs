use ndarray::{Array3, ArrayView2, Axis};
use num_traits::Float;

/// Reflects an out-of-range index back into `0..len`, excluding the edge itself (`d c b | a b c d | c b a`)
#[inline]
fn mirror(index: isize, len: usize) -> usize {
    let len = len as isize;
    if len == 1 {
        return 0;
    }

    let index = if index < 0 {
        -index
    } else if index >= len {
        2 * (len - 1) - index
    } else {
        index
    };

    index as usize
}

fn neighbour_max<T: Float>(plane: &ArrayView2<T>, y: usize, x: usize) -> T {
    let (height, width) = plane.dim();
    let mut max = T::neg_infinity();

    for dy in -1isize..=1 {
        for dx in -1isize..=1 {
            if dy == 0 && dx == 0 {
                continue;
            }

            let ny = mirror(y as isize + dy, height);
            let nx = mirror(x as isize + dx, width);

            max = max.max(plane[[ny, nx]]);
        }
    }

    max
}

/// Remove hot pixels from every channel of an image of shape (channels, height, width).
///
/// A pixel is hot when it exceeds the maximum of its 8 neighbours (edges mirrored) by more than `threshold`,
/// in which case it is replaced by that maximum. All other pixels are returned unchanged.
pub fn filter_hot_pixels<T: Float>(image: &Array3<T>, threshold: T) -> Array3<T> {
    let mut filtered = image.clone();

    for (channel, mut filtered_plane) in filtered.axis_iter_mut(Axis(0)).enumerate() {
        let plane = image.index_axis(Axis(0), channel);

        for ((y, x), value) in filtered_plane.indexed_iter_mut() {
            let max = neighbour_max(&plane, y, x);

            if *value - max > threshold {
                *value = max;
            }
        }
    }

    filtered
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn mirrors_edges() {
        assert_eq!(mirror(-1, 4), 1);
        assert_eq!(mirror(4, 4), 2);
        assert_eq!(mirror(2, 4), 2);
        assert_eq!(mirror(-1, 1), 0);
        assert_eq!(mirror(1, 1), 0);
    }

    #[test]
    fn infinite_threshold_is_identity() {
        let image = array![[[1.0f32, 100.0, 3.0], [4.0, 5.0, 600.0]], [[0.0, 0.0, 0.0], [0.0, 9.0, 0.0]]];

        assert_eq!(filter_hot_pixels(&image, f32::INFINITY), image);
    }

    #[test]
    fn single_spike_is_replaced_by_neighbour_max() {
        let mut image = Array3::<f64>::ones((1, 5, 5));
        image[[0, 1, 1]] = 2.0;
        image[[0, 2, 2]] = 100.0;

        let filtered = filter_hot_pixels(&image, 50.0);

        assert_eq!(filtered[[0, 2, 2]], 2.0);

        let mut expected = image.clone();
        expected[[0, 2, 2]] = 2.0;
        assert_eq!(filtered, expected);
    }

    #[test]
    fn edge_pixels_compare_against_mirrored_neighbours() {
        let image = array![[[10.0f32, 1.0, 1.0], [1.0, 1.0, 1.0]]];

        let filtered = filter_hot_pixels(&image, 5.0);

        assert_eq!(filtered[[0, 0, 0]], 1.0);
        assert_eq!(filtered[[0, 0, 1]], 1.0);
    }
}
