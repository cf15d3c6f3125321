//! 内存压力信号与自适应批大小

use crate::config::QueryConfig;

/// 宿主环境注入的内存压力读数，0.0（空闲）~ 1.0（满）
pub trait MemoryPressure: Send + Sync {
    fn utilization(&self) -> f64;
}

impl<F> MemoryPressure for F
where
    F: Fn() -> f64 + Send + Sync,
{
    fn utilization(&self) -> f64 {
        let u = self();
        if u.is_nan() { 0.0 } else { u.clamp(0.0, 1.0) }
    }
}

/// 固定读数，测试与无监控环境使用
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedPressure(pub f64);

impl MemoryPressure for FixedPressure {
    fn utilization(&self) -> f64 { self.0 }
}

/// 每处理 `check_interval` 行重新评估一次：
/// 高于 high_water 减半（不低于 min），低于 low_water 翻倍（不高于 max）
///
/// 批大小只约束交给调用方的行数；存储层按块解码，驻留行数的下限是块行数。
#[derive(Debug, Clone)]
pub struct BatchSizer {
    size:           usize,
    min:            usize,
    max:            usize,
    check_interval: u64,
    high_water:     f64,
    low_water:      f64,
    since_check:    u64,
}

impl BatchSizer {
    /// 边界不合法时收敛为 `1 <= min <= max`
    pub fn new(initial: usize, config: &QueryConfig) -> Self {
        let min = config.min_batch.max(1);
        let max = config.max_batch.max(min);
        Self {
            size:           initial.clamp(min, max),
            min,
            max,
            check_interval: config.check_interval,
            high_water:     config.high_water,
            low_water:      config.low_water,
            since_check:    0,
        }
    }

    pub fn size(&self) -> usize { self.size }

    /// 记录已处理行数，到达检查间隔时按压力调整批大小
    pub fn record(&mut self, rows: usize, pressure: &dyn MemoryPressure) -> usize {
        self.since_check += rows as u64;
        if self.since_check >= self.check_interval {
            self.since_check = 0;
            let u = pressure.utilization();
            if u > self.high_water {
                self.size = (self.size / 2).max(self.min);
            } else if u < self.low_water {
                self.size = self.size.saturating_mul(2).min(self.max);
            }
        }
        self.size
    }
}
