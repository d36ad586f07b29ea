//! 向量索引服务

use crate::error::{AppError, Result};

/// 向量索引接口
///
/// 顺序追加、k 近邻查询。实现必须保证结果按距离升序、
/// 距离相等时按插入序稳定排列。调用方不得假设 O(n) 扫描成本，
/// 以便后续替换为近似索引结构。
pub trait VectorIndex: Send + Sync {
    /// 追加一个向量，返回其插入位置
    fn append(&mut self, vector: Vec<f32>) -> Result<usize>;
    /// k 近邻查询，返回 (插入位置, 平方 L2 距离)，按距离升序
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>>;
    /// 清空索引
    fn clear(&mut self);
    /// 当前向量数量
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 平铺向量索引
///
/// 无索引结构的线性扫描实现。对话历史规模（数百到数千条）下
/// 足够快且完全精确。
pub struct FlatVectorIndex {
    vectors: Vec<Vec<f32>>,
    dimension: usize,
}

impl FlatVectorIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            vectors: Vec::new(),
            dimension,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
        a.iter()
            .zip(b.iter())
            .map(|(x, y)| {
                let d = x - y;
                d * d
            })
            .sum()
    }
}

impl VectorIndex for FlatVectorIndex {
    fn append(&mut self, vector: Vec<f32>) -> Result<usize> {
        if vector.len() != self.dimension {
            return Err(AppError::VectorIndex(format!(
                "dimension mismatch: expected {}, got {}",
                self.dimension,
                vector.len()
            )));
        }

        self.vectors.push(vector);
        Ok(self.vectors.len() - 1)
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if self.vectors.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        if query.len() != self.dimension {
            return Err(AppError::VectorIndex(format!(
                "dimension mismatch: expected {}, got {}",
                self.dimension,
                query.len()
            )));
        }

        let mut results: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(idx, vector)| (idx, Self::squared_l2(query, vector)))
            .collect();

        // 距离升序，距离相等时低插入位序优先，保证确定性
        results.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        results.truncate(k);

        Ok(results)
    }

    fn clear(&mut self) {
        self.vectors.clear();
    }

    fn len(&self) -> usize {
        self.vectors.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_hot(dim: usize, pos: usize) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[pos] = 1.0;
        v
    }

    #[test]
    fn test_append_and_search() {
        let mut index = FlatVectorIndex::new(4);
        index.append(one_hot(4, 0)).unwrap();
        index.append(one_hot(4, 1)).unwrap();
        index.append(one_hot(4, 2)).unwrap();

        let results = index.search(&one_hot(4, 1), 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, 1);
        assert_eq!(results[0].1, 0.0);
        assert!(results[0].1 <= results[1].1);
    }

    #[test]
    fn test_search_empty_index_returns_empty() {
        let index = FlatVectorIndex::new(4);
        let results = index.search(&one_hot(4, 0), 3).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_search_length_is_min_k_len() {
        let mut index = FlatVectorIndex::new(2);
        index.append(vec![1.0, 0.0]).unwrap();
        index.append(vec![0.0, 1.0]).unwrap();

        let results = index.search(&[1.0, 0.0], 10).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_equal_distance_tie_break_by_insertion_index() {
        let mut index = FlatVectorIndex::new(2);
        // 两个相同向量，到任何查询点的距离完全相等
        index.append(vec![1.0, 1.0]).unwrap();
        index.append(vec![1.0, 1.0]).unwrap();

        let results = index.search(&[0.0, 0.0], 2).unwrap();
        assert_eq!(results[0].0, 0);
        assert_eq!(results[1].0, 1);
    }

    #[test]
    fn test_search_is_deterministic() {
        let mut index = FlatVectorIndex::new(3);
        index.append(vec![0.5, 0.5, 0.0]).unwrap();
        index.append(vec![0.0, 0.5, 0.5]).unwrap();
        index.append(vec![0.5, 0.0, 0.5]).unwrap();

        let query = [0.3, 0.3, 0.3];
        let first = index.search(&query, 3).unwrap();
        let second = index.search(&query, 3).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_dimension_mismatch_is_an_error() {
        let mut index = FlatVectorIndex::new(4);
        assert!(index.append(vec![0.0; 3]).is_err());

        index.append(vec![0.0; 4]).unwrap();
        assert!(index.search(&[0.0; 5], 1).is_err());
    }

    #[test]
    fn test_clear_empties_index() {
        let mut index = FlatVectorIndex::new(2);
        index.append(vec![1.0, 0.0]).unwrap();
        index.clear();
        assert_eq!(index.len(), 0);
        assert!(index.search(&[1.0, 0.0], 1).unwrap().is_empty());
    }
}
