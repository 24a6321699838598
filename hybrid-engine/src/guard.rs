//! 编辑守卫：阻止用户手动修改编号气泡的标签与隐藏标识。
//!
//! 守卫只有两种状态：`Active` 与 `Suspended { depth }`。程序化写入通过
//! [`EditGuard::suspend`] 得到的 [`SuspendScope`] 暂停守卫，作用域可嵌套，
//! 离开时自动恢复。

use std::cell::Cell;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use hybrid_core::document::EntityId;
use tracing::{debug, warn};

use crate::errors::HostError;
use crate::host::MarkerHost;
use crate::settings::{GuardSettings, MarkerSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Active,
    Suspended { depth: usize },
}

/// 守卫暂停作用域，析构时恢复深度。
#[must_use = "守卫只在作用域存活期间保持暂停"]
pub struct SuspendScope<'a> {
    depth: &'a Cell<usize>,
}

impl Drop for SuspendScope<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}

/// 提示限频：冷却期内最多提示一次。
#[derive(Debug, Clone)]
pub struct WarningLimiter {
    cooldown: Duration,
    last: Option<Instant>,
}

impl WarningLimiter {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last: None,
        }
    }

    pub fn should_warn(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.cooldown => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

/// 对一次属性修改通知的裁决。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardVerdict {
    /// 不受保护的属性，或守卫处于暂停状态。
    Allowed,
    Unchanged,
    Reverted { original: String, warned: bool },
}

#[derive(Debug)]
pub struct EditGuard {
    depth: Cell<usize>,
    numbering_block: String,
    watched_tags: Vec<String>,
    pass_through: HashSet<String>,
    running: Vec<String>,
    captured: HashMap<(EntityId, String), String>,
    limiter: WarningLimiter,
}

impl EditGuard {
    pub fn new(settings: &GuardSettings, markers: &MarkerSettings) -> Self {
        Self {
            depth: Cell::new(0),
            numbering_block: markers.numbering_block.clone(),
            watched_tags: vec![
                markers.number_tag.to_ascii_uppercase(),
                markers.id_tag.to_ascii_uppercase(),
            ],
            pass_through: settings
                .pass_through_commands
                .iter()
                .map(|name| name.trim().to_ascii_uppercase())
                .collect(),
            running: Vec::new(),
            captured: HashMap::new(),
            limiter: WarningLimiter::new(settings.warning_cooldown),
        }
    }

    pub fn state(&self) -> GuardState {
        match self.depth.get() {
            0 => GuardState::Active,
            depth => GuardState::Suspended { depth },
        }
    }

    #[inline]
    pub fn is_suspended(&self) -> bool {
        self.depth.get() > 0
    }

    pub fn suspend(&self) -> SuspendScope<'_> {
        self.depth.set(self.depth.get() + 1);
        SuspendScope { depth: &self.depth }
    }

    pub fn is_pass_through(&self, command: &str) -> bool {
        self.pass_through
            .contains(&command.trim().to_ascii_uppercase())
    }

    /// 宿主命令开始。放行名单中的命令在其执行期间暂停守卫，返回是否已暂停。
    pub fn command_will_start(&mut self, command: &str) -> bool {
        if !self.is_pass_through(command) {
            return false;
        }
        self.running.push(command.trim().to_ascii_uppercase());
        self.depth.set(self.depth.get() + 1);
        debug!(command, depth = self.depth.get(), "放行命令暂停编辑守卫");
        true
    }

    /// 宿主命令结束（含取消与失败）。
    pub fn command_ended(&mut self, command: &str) {
        let name = command.trim().to_ascii_uppercase();
        if let Some(position) = self.running.iter().rposition(|running| *running == name) {
            self.running.remove(position);
            self.depth.set(self.depth.get().saturating_sub(1));
        }
    }

    fn is_watched<H: MarkerHost + ?Sized>(&self, host: &H, marker: EntityId, tag: &str) -> bool {
        let tag = tag.to_ascii_uppercase();
        self.watched_tags.contains(&tag)
            && host
                .marker_kind(marker)
                .is_some_and(|kind| kind.eq_ignore_ascii_case(&self.numbering_block))
    }

    /// 属性被打开准备写入：记录首次打开时的原值。
    pub fn attribute_opened<H: MarkerHost + ?Sized>(
        &mut self,
        host: &H,
        marker: EntityId,
        tag: &str,
    ) {
        if self.is_suspended() || !self.is_watched(host, marker, tag) {
            return;
        }
        let Some(current) = host.marker_attribute(marker, tag) else {
            return;
        };
        self.captured
            .entry((marker, tag.to_ascii_uppercase()))
            .or_insert(current);
    }

    /// 属性修改通知：值与原值不同且守卫未暂停时，同步写回原值。
    pub fn attribute_modified<H: MarkerHost + ?Sized>(
        &mut self,
        host: &mut H,
        marker: EntityId,
        tag: &str,
        now: Instant,
    ) -> Result<GuardVerdict, HostError> {
        let Some(original) = self.captured.remove(&(marker, tag.to_ascii_uppercase())) else {
            return Ok(GuardVerdict::Allowed);
        };
        if self.is_suspended() {
            return Ok(GuardVerdict::Allowed);
        }
        let current = host.marker_attribute(marker, tag);
        if current.as_deref() == Some(original.as_str()) {
            return Ok(GuardVerdict::Unchanged);
        }

        {
            let _scope = self.suspend();
            host.set_marker_attribute(marker, tag, &original)?;
        }
        let warned = self.limiter.should_warn(now);
        if warned {
            warn!(
                marker = marker.get(),
                tag,
                "编号气泡由同步命令维护，手动修改已撤销"
            );
        } else {
            debug!(marker = marker.get(), tag, "撤销编号气泡的手动修改");
        }
        Ok(GuardVerdict::Reverted { original, warned })
    }
}
