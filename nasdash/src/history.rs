//! Small utilities to manage bounded history buffers for charts.

use std::collections::VecDeque;

use crate::types::SeriesView;

pub fn push_capped<T>(dq: &mut VecDeque<T>, v: T, cap: usize) {
    if cap == 0 {
        return;
    }
    while dq.len() >= cap {
        dq.pop_front();
    }
    dq.push_back(v);
}

// Keeps one deque per charted series with a fixed capacity
#[derive(Debug, Clone)]
pub struct MetricHistory {
    cpu: VecDeque<f64>,
    upload: VecDeque<f64>,
    download: VecDeque<f64>,
    cap: usize,
}

impl MetricHistory {
    pub fn new(cap: usize) -> Self {
        Self {
            cpu: VecDeque::new(),
            upload: VecDeque::new(),
            download: VecDeque::new(),
            cap,
        }
    }

    // Unknown samples leave a series untouched
    pub fn push(&mut self, cpu: Option<f64>, upload: Option<f64>, download: Option<f64>) {
        if let Some(v) = cpu {
            push_capped(&mut self.cpu, v, self.cap);
        }
        if let Some(v) = upload {
            push_capped(&mut self.upload, v, self.cap);
        }
        if let Some(v) = download {
            push_capped(&mut self.download, v, self.cap);
        }
    }

    pub fn view(&self) -> SeriesView {
        SeriesView {
            cpu_percent: self.cpu.iter().copied().collect(),
            upload_bytes_per_second: self.upload.iter().copied().collect(),
            download_bytes_per_second: self.download.iter().copied().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_capped_drops_oldest() {
        let mut dq = VecDeque::new();
        for v in 0..5 {
            push_capped(&mut dq, v, 3);
        }
        assert_eq!(dq, VecDeque::from(vec![2, 3, 4]));
    }

    #[test]
    fn unknown_samples_are_not_plotted() {
        let mut h = MetricHistory::new(2);
        h.push(None, Some(1.0), None);
        h.push(Some(10.0), Some(2.0), Some(5.0));
        h.push(Some(20.0), Some(3.0), None);
        let v = h.view();
        assert_eq!(v.cpu_percent, vec![10.0, 20.0]);
        assert_eq!(v.upload_bytes_per_second, vec![2.0, 3.0]);
        assert_eq!(v.download_bytes_per_second, vec![5.0]);
    }

    #[test]
    fn huge_cap_allocates_lazily() {
        let mut h = MetricHistory::new(usize::MAX);
        h.push(Some(1.0), None, None);
        assert_eq!(h.view().cpu_percent, vec![1.0]);
    }
}
