//! 个股与概念的归属关系
//!
//! 归属关系由外部目录维护，这里只读

use crate::{Error, Result};
use gainian_utils::normalize_stock_code;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;

/// 个股所属概念的只读查询接口
pub trait ConceptMembership: Send + Sync {
    /// 股票代码须为规范化后的代码
    fn concepts_for_stock(&self, stock_code: &str) -> Result<Vec<String>>;
}

/// 内存中的归属表
#[derive(Debug, Clone, Default)]
pub struct MembershipMap {
    inner: BTreeMap<String, BTreeSet<String>>,
}

impl MembershipMap {
    pub fn new() -> Self {
        MembershipMap::default()
    }

    /// 添加归属，代码会被规范化
    pub fn insert(&mut self, stock_code: &str, concept: &str) {
        let code = normalize_stock_code(stock_code).normalized;
        let concept = concept.trim();
        if code.is_empty() || concept.is_empty() {
            return;
        }
        self.inner
            .entry(code)
            .or_insert_with(BTreeSet::new)
            .insert(concept.to_owned());
    }

    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut m = MembershipMap::new();
        for (code, concept) in pairs {
            m.insert(code, concept);
        }
        m
    }

    /// 从CSV读取，每行为 `代码,概念1[,概念2...]`
    ///
    /// 首行若为表头（如 `code,concept`）则跳过
    pub fn from_csv_reader<R: Read>(rdr: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(rdr);
        let mut m = MembershipMap::new();
        for (i, r) in reader.records().enumerate() {
            let rec = r?;
            if rec.len() < 2 {
                continue;
            }
            if i == 0 && is_header(&rec[0]) {
                continue;
            }
            for concept in rec.iter().skip(1) {
                m.insert(&rec[0], concept);
            }
        }
        if m.is_empty() {
            return Err(Error("no concept membership found".to_owned()));
        }
        Ok(m)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// 所有概念名称，升序
    pub fn concepts(&self) -> BTreeSet<String> {
        self.inner.values().flatten().cloned().collect()
    }
}

fn is_header(first: &str) -> bool {
    let lower = first.to_lowercase();
    lower == "code" || lower == "stock_code" || lower == "股票代码" || lower == "代码"
}

impl ConceptMembership for MembershipMap {
    fn concepts_for_stock(&self, stock_code: &str) -> Result<Vec<String>> {
        Ok(self
            .inner
            .get(stock_code)
            .map(|cs| cs.iter().cloned().collect())
            .unwrap_or_default())
    }
}
