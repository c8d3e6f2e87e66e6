//! 贝塞尔曲线插值

/// 采样点数量（表中另有一个终点 1.0）
pub const TABLE_SIZE: usize = 64;

const NEWTON_TOLERANCE: f32 = 0.0001;
const NEWTON_MAX_ITERATIONS: usize = 32;

/// 关键帧插值曲线
///
/// 控制点来自 VMD 的 0..127 字节。构建时对曲线均匀采样，
/// 求值时在相邻两个采样点之间线性插值。
#[derive(Clone, Debug, PartialEq)]
pub struct InterpolationCurve {
    linear: bool,
    table: Vec<f32>,
}

impl InterpolationCurve {
    /// 从控制点字节创建
    pub fn new(x1: u8, y1: u8, x2: u8, y2: u8) -> Self {
        if x1 == y1 && x2 == y2 {
            return Self::linear();
        }
        let (x1, y1, x2, y2) = (control(x1), control(y1), control(x2), control(y2));
        let mut table = Vec::with_capacity(TABLE_SIZE + 1);
        for i in 0..TABLE_SIZE {
            let x = i as f32 / TABLE_SIZE as f32;
            let t = solve_parameter(x, x1, x2);
            table.push(spline1(t, y1, y2));
        }
        table.push(1.0);
        Self {
            linear: false,
            table,
        }
    }

    /// 直线
    pub fn linear() -> Self {
        Self {
            linear: true,
            table: Vec::new(),
        }
    }

    pub fn is_linear(&self) -> bool {
        self.linear
    }

    /// 把线性权重映射为曲线修正后的权重
    pub fn weight(&self, w: f32) -> f32 {
        if self.linear {
            return w;
        }
        let scaled = w * TABLE_SIZE as f32;
        if !(scaled >= 0.0) {
            return self.table[0];
        }
        let index = scaled as usize;
        if index >= TABLE_SIZE {
            return self.table[TABLE_SIZE];
        }
        let fraction = scaled - index as f32;
        let v = self.table[index];
        v + (self.table[index + 1] - v) * fraction
    }
}

impl Default for InterpolationCurve {
    fn default() -> Self {
        Self::linear()
    }
}

/// 控制点字节按有符号数解释后归一化
fn control(raw: u8) -> f32 {
    raw as i8 as f32 / 127.0
}

/// 牛顿法求解 x(t) = x 的 t
fn solve_parameter(x: f32, x1: f32, x2: f32) -> f32 {
    let mut t = x;
    for _ in 0..NEWTON_MAX_ITERATIONS {
        let v = spline1(t, x1, x2) - x;
        if v.abs() < NEWTON_TOLERANCE {
            break;
        }
        let slope = spline2(t, x1, x2);
        if slope == 0.0 {
            break;
        }
        t -= v / slope;
    }
    t
}

/// 端点固定为 0 和 1 的三次贝塞尔
fn spline1(t: f32, p1: f32, p2: f32) -> f32 {
    ((1.0 + 3.0 * p1 - 3.0 * p2) * t * t * t) + ((3.0 * p2 - 6.0 * p1) * t * t) + (3.0 * p1 * t)
}

/// spline1 的导数
fn spline2(t: f32, p1: f32, p2: f32) -> f32 {
    ((3.0 + 9.0 * p1 - 9.0 * p2) * t * t) + ((6.0 * p2 - 12.0 * p1) * t) + (3.0 * p1)
}
