//! Mock CV 模块
//!
//! 用于测试与 CLI 演示，支持注入失败场景并记录调用历史。

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use contracts::{
    ActualModuleConfig, CapabilitySource, ContractError, CorrelatedSampleSet, CvModule, ModuleUid,
    SupportedModuleConfig,
};
use tracing::{debug, instrument};

/// 调用记录
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleCall {
    SetConfig(ActualModuleConfig),
    ResetConfig,
    FlushResources,
    /// 处理的样本集序号
    Process(u64),
}

/// Mock CV 模块
pub struct MockCvModule {
    uid: ModuleUid,
    /// 按偏好顺序声明的配置
    configs: Vec<SupportedModuleConfig>,
    /// 拒绝所有配置
    reject_configs: bool,
    /// 处理样本集时返回错误
    fail_processing: bool,
    /// 模拟处理耗时
    processing_delay: Option<Duration>,
    applied: Mutex<Option<ActualModuleConfig>>,
    calls: Mutex<Vec<ModuleCall>>,
}

impl MockCvModule {
    pub fn new(uid: ModuleUid, configs: Vec<SupportedModuleConfig>) -> Self {
        Self {
            uid,
            configs,
            reject_configs: false,
            fail_processing: false,
            processing_delay: None,
            applied: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// `set_module_config` 总是失败
    pub fn rejecting_configs(mut self) -> Self {
        self.reject_configs = true;
        self
    }

    /// `process_sample_set` 总是失败
    pub fn failing_processing(mut self) -> Self {
        self.fail_processing = true;
        self
    }

    pub fn with_processing_delay(mut self, delay: Duration) -> Self {
        self.processing_delay = Some(delay);
        self
    }

    /// 当前生效的配置
    pub fn applied_config(&self) -> Option<ActualModuleConfig> {
        lock(&self.applied).clone()
    }

    /// 全部调用历史
    pub fn calls(&self) -> Vec<ModuleCall> {
        lock(&self.calls).clone()
    }

    /// 已处理的样本集序号
    pub fn processed_sequences(&self) -> Vec<u64> {
        lock(&self.calls)
            .iter()
            .filter_map(|call| match call {
                ModuleCall::Process(sequence) => Some(*sequence),
                _ => None,
            })
            .collect()
    }

    pub fn reset_count(&self) -> usize {
        self.count(|call| matches!(call, ModuleCall::ResetConfig))
    }

    pub fn flush_count(&self) -> usize {
        self.count(|call| matches!(call, ModuleCall::FlushResources))
    }

    fn count(&self, predicate: impl Fn(&ModuleCall) -> bool) -> usize {
        lock(&self.calls).iter().filter(|call| predicate(call)).count()
    }

    fn record(&self, call: ModuleCall) {
        lock(&self.calls).push(call);
    }
}

impl CapabilitySource for MockCvModule {
    fn supported_config(&self, index: usize) -> Option<SupportedModuleConfig> {
        self.configs.get(index).cloned()
    }
}

impl CvModule for MockCvModule {
    fn module_uid(&self) -> ModuleUid {
        self.uid
    }

    #[instrument(name = "mock_module_set_config", skip(self, config), fields(uid = self.uid))]
    fn set_module_config(&self, config: &ActualModuleConfig) -> Result<(), ContractError> {
        self.record(ModuleCall::SetConfig(config.clone()));

        if self.reject_configs {
            return Err(ContractError::module_config(self.uid, "mock failure"));
        }

        *lock(&self.applied) = Some(config.clone());
        Ok(())
    }

    fn reset_config(&self) {
        self.record(ModuleCall::ResetConfig);
        *lock(&self.applied) = None;
    }

    fn flush_resources(&self) {
        self.record(ModuleCall::FlushResources);
        debug!(uid = self.uid, "Resources flushed");
    }

    fn process_sample_set(&self, sample_set: &CorrelatedSampleSet) -> Result<(), ContractError> {
        if let Some(delay) = self.processing_delay {
            thread::sleep(delay);
        }
        self.record(ModuleCall::Process(sample_set.sequence));

        if self.fail_processing {
            return Err(ContractError::module_processing(self.uid, "mock failure"));
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
