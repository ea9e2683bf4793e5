//! 网格区域合并
//!
//! 启发式检测器共用的工具：把按格子标记的掩码合并成连通区域，
//! 再转回像素坐标框。

use crate::core::detect::PixelBox;

/// 检测器扫描用的格子边长（像素）
pub const CELL: usize = 8;

/// 按格子标记的二值掩码
pub struct GridMask {
    cols: usize,
    rows: usize,
    cells: Vec<bool>,
}

impl GridMask {
    pub fn new(cols: usize, rows: usize) -> Self {
        Self {
            cols,
            rows,
            cells: vec![false; cols * rows],
        }
    }

    /// 按帧尺寸建格，边缘不足一格的像素忽略
    pub fn for_frame(width: u32, height: u32) -> Self {
        let cols = (width as usize / CELL).max(1);
        let rows = (height as usize / CELL).max(1);
        Self::new(cols, rows)
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn mark(&mut self, cx: usize, cy: usize) {
        if cx < self.cols && cy < self.rows {
            self.cells[cy * self.cols + cx] = true;
        }
    }

    pub fn is_marked(&self, cx: usize, cy: usize) -> bool {
        cx < self.cols && cy < self.rows && self.cells[cy * self.cols + cx]
    }

    /// 4 连通泛洪，合并标记格子为区域
    pub fn regions(&self) -> Vec<CellRegion> {
        let mut visited = vec![false; self.cells.len()];
        let mut regions = Vec::new();

        for start in 0..self.cells.len() {
            if !self.cells[start] || visited[start] {
                continue;
            }

            let mut members = Vec::new();
            let mut stack = vec![start];
            visited[start] = true;

            while let Some(idx) = stack.pop() {
                let cx = idx % self.cols;
                let cy = idx / self.cols;
                members.push((cx, cy));

                let neighbors = [
                    (cx.wrapping_sub(1), cy),
                    (cx + 1, cy),
                    (cx, cy.wrapping_sub(1)),
                    (cx, cy + 1),
                ];
                for (nx, ny) in neighbors {
                    if nx < self.cols && ny < self.rows {
                        let nidx = ny * self.cols + nx;
                        if self.cells[nidx] && !visited[nidx] {
                            visited[nidx] = true;
                            stack.push(nidx);
                        }
                    }
                }
            }

            regions.push(CellRegion::from_members(members));
        }

        regions
    }
}

/// 一个连通的格子区域
#[derive(Debug, Clone)]
pub struct CellRegion {
    pub min_x: usize,
    pub min_y: usize,
    pub max_x: usize,
    pub max_y: usize,
    pub members: Vec<(usize, usize)>,
}

impl CellRegion {
    fn from_members(members: Vec<(usize, usize)>) -> Self {
        let mut min_x = usize::MAX;
        let mut min_y = usize::MAX;
        let mut max_x = 0;
        let mut max_y = 0;
        for &(cx, cy) in &members {
            min_x = min_x.min(cx);
            min_y = min_y.min(cy);
            max_x = max_x.max(cx);
            max_y = max_y.max(cy);
        }
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
            members,
        }
    }

    /// 区域覆盖的像素面积（按成员格子数计，接近真实轮廓面积）
    pub fn pixel_area(&self) -> f32 {
        (self.members.len() * CELL * CELL) as f32
    }

    /// 外接矩形转像素坐标框
    pub fn to_pixel_box(&self) -> PixelBox {
        PixelBox {
            x: (self.min_x * CELL) as f32,
            y: (self.min_y * CELL) as f32,
            width: ((self.max_x - self.min_x + 1) * CELL) as f32,
            height: ((self.max_y - self.min_y + 1) * CELL) as f32,
        }
    }

    /// 外接矩形宽高比
    pub fn aspect_ratio(&self) -> f32 {
        let w = (self.max_x - self.min_x + 1) as f32;
        let h = (self.max_y - self.min_y + 1) as f32;
        w / h
    }
}
