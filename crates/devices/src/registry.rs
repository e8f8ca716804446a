//! Ordered device registry and command dispatch.

use tether_memory::TargetMemory;

use crate::command::{Command, MAX_DEVICES};
use crate::device::{Device, NullDevice};
use crate::error::{DeviceError, Result};

/// Fixed-capacity, registration-ordered list of devices.
///
/// Device ids index into registration order. Any in-range id without a
/// registered device resolves to an owned [`NullDevice`], so a stray command is
/// answered as a no-op rather than dropped.
pub struct DeviceRegistry {
    devices: Vec<Box<dyn Device>>,
    null: NullDevice,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self {
            devices: Vec::new(),
            null: NullDevice::new(),
        }
    }

    /// Appends `device` at the next free slot.
    pub fn register_device(&mut self, device: Box<dyn Device>) -> Result<()> {
        if self.devices.len() >= MAX_DEVICES {
            return Err(DeviceError::RegistryFull {
                capacity: MAX_DEVICES,
            });
        }
        tracing::debug!(
            slot = self.devices.len(),
            identity = device.identity(),
            "registered device"
        );
        self.devices.push(device);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Routes `cmd` to the device it names.
    pub fn dispatch(&mut self, mem: &mut dyn TargetMemory, cmd: Command) -> Result<()> {
        match self.devices.get_mut(cmd.device() as usize) {
            Some(device) => device.handle_command(mem, cmd),
            None => self.null.handle_command(mem, cmd),
        }
    }

    /// Advances every registered device once, in registration order.
    pub fn tick(&mut self) -> Result<()> {
        for device in &mut self.devices {
            device.tick()?;
        }
        Ok(())
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::NOOP_RESPONSE;
    use std::cell::Cell;
    use std::rc::Rc;
    use tether_memory::DenseMemory;

    fn command(device: u8, cmd: u8) -> (Command, Rc<Cell<Option<u64>>>) {
        let seen = Rc::new(Cell::new(None));
        let sink = seen.clone();
        (Command::new(device, cmd, 0, move |v| sink.set(Some(v))), seen)
    }

    #[test]
    fn unregistered_device_id_resolves_to_a_noop() {
        let mut registry = DeviceRegistry::new();
        let mut mem = DenseMemory::new(0);
        let (cmd, seen) = command(200, 7);

        registry.dispatch(&mut mem, cmd).unwrap();
        assert_eq!(seen.get(), Some(NOOP_RESPONSE));
    }

    #[test]
    fn registration_order_assigns_device_ids() {
        let mut registry = DeviceRegistry::new();
        registry.register_device(Box::new(NullDevice::new())).unwrap();
        registry.register_device(Box::new(NullDevice::new())).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn registry_capacity_is_enforced() {
        let mut registry = DeviceRegistry::new();
        for _ in 0..MAX_DEVICES {
            registry.register_device(Box::new(NullDevice::new())).unwrap();
        }
        let err = registry
            .register_device(Box::new(NullDevice::new()))
            .unwrap_err();
        assert!(matches!(err, DeviceError::RegistryFull { .. }));
    }
}
