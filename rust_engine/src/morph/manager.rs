//! Morph 管理器

use glam::Vec3;
use std::collections::HashMap;

use super::Morph;

/// Morph 管理器
pub struct MorphManager {
    morphs: Vec<Morph>,
    name_to_index: HashMap<Vec<u8>, usize>,
    base_index: Option<usize>,
}

impl MorphManager {
    pub fn new() -> Self {
        Self {
            morphs: Vec::new(),
            name_to_index: HashMap::new(),
            base_index: None,
        }
    }

    /// 添加 Morph（重名时保留第一个；只记录第一个 Base）
    pub fn add_morph(&mut self, morph: Morph) {
        let index = self.morphs.len();
        if morph.is_base() && self.base_index.is_none() {
            self.base_index = Some(index);
        }
        self.name_to_index
            .entry(morph.name.as_bytes().to_vec())
            .or_insert(index);
        self.morphs.push(morph);
    }

    /// 把非 Base 表情的顶点索引从 Base 列表下标换算为模型顶点索引
    ///
    /// 小于 Base 顶点数的索引通过 Base 列表换算，其余索引原样保留。
    /// 所有表情加入后调用一次。
    pub fn rebase_indices(&mut self) {
        let Some(base_index) = self.base_index else {
            return;
        };
        let base_ids: Vec<u32> = self.morphs[base_index]
            .vertex_offsets
            .iter()
            .map(|o| o.vertex_index)
            .collect();

        for morph in self.morphs.iter_mut().filter(|m| !m.is_base()) {
            for offset in &mut morph.vertex_offsets {
                if let Some(&id) = base_ids.get(offset.vertex_index as usize) {
                    offset.vertex_index = id;
                }
            }
        }
    }

    /// 通过名称字节查找 Morph
    pub fn find_morph_by_name(&self, name: &[u8]) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// 通过 UTF-8 名称查找 Morph
    pub fn find_morph_by_str(&self, name: &str) -> Option<usize> {
        self.find_morph_by_name(&crate::binary::encode_shift_jis(name))
    }

    /// 获取 Morph 数量
    pub fn morph_count(&self) -> usize {
        self.morphs.len()
    }

    pub fn morphs(&self) -> &[Morph] {
        &self.morphs
    }

    pub fn base_morph(&self) -> Option<&Morph> {
        self.base_index.map(|i| &self.morphs[i])
    }

    /// 获取 Morph
    pub fn get_morph(&self, index: usize) -> Option<&Morph> {
        self.morphs.get(index)
    }

    /// 获取可变 Morph 引用
    pub fn get_morph_mut(&mut self, index: usize) -> Option<&mut Morph> {
        self.morphs.get_mut(index)
    }

    /// 设置 Morph 权重
    pub fn set_morph_weight(&mut self, index: usize, weight: f32) {
        if let Some(morph) = self.morphs.get_mut(index) {
            morph.set_weight(weight);
        }
    }

    /// 重置所有 Morph 权重
    pub fn reset_all_weights(&mut self) {
        for morph in &mut self.morphs {
            morph.reset();
        }
    }

    /// 应用所有 Morph 到顶点位置
    ///
    /// 先把 Base 覆盖的顶点恢复为 Base 中的位置，再叠加各表情的 `位移 * 权重`。
    /// Base 之外的顶点不会被恢复，调用前 `positions` 应为静止位置。
    pub fn apply_morphs(&self, positions: &mut [Vec3]) {
        if let Some(base) = self.base_morph() {
            for offset in &base.vertex_offsets {
                if let Some(position) = positions.get_mut(offset.vertex_index as usize) {
                    *position = offset.offset;
                }
            }
        }

        for morph in &self.morphs {
            if morph.is_base() || morph.weight == 0.0 {
                continue;
            }
            self.apply_vertex_morph(morph, positions);
        }
    }

    /// 应用顶点 Morph
    fn apply_vertex_morph(&self, morph: &Morph, positions: &mut [Vec3]) {
        let weight = morph.weight;

        for offset in &morph.vertex_offsets {
            let idx = offset.vertex_index as usize;
            if idx < positions.len() {
                positions[idx] += offset.offset * weight;
            }
        }
    }
}

impl Default for MorphManager {
    fn default() -> Self {
        Self::new()
    }
}
