use crds::{Bios, Efi, VirtualMachineInstanceSpec, VirtualMachinePreferenceSpec};

/// Picks a bootloader when none is chosen and fills its unset options.
///
/// A full `preferredEfi` replaces the EFI bootloader outright and takes
/// precedence over `preferredUseEfi` and `preferredUseSecureBoot`.
pub(super) fn apply_firmware_preferences(preference: &VirtualMachinePreferenceSpec, spec: &mut VirtualMachineInstanceSpec) {
    let Some(preferred) = &preference.firmware else {
        return;
    };

    let firmware = spec.domain.firmware.get_or_insert_with(Default::default);
    let bootloader = firmware.bootloader.get_or_insert_with(Default::default);

    if preferred.preferred_use_bios == Some(true) && bootloader.bios.is_none() && bootloader.efi.is_none() {
        bootloader.bios = Some(Bios::default());
    }
    if let Some(bios) = bootloader.bios.as_mut() {
        if bios.use_serial.is_none() {
            bios.use_serial = preferred.preferred_use_bios_serial;
        }
    }

    if let Some(efi) = &preferred.preferred_efi {
        bootloader.efi = Some(efi.clone());
        return;
    }

    if preferred.preferred_use_efi == Some(true) && bootloader.efi.is_none() && bootloader.bios.is_none() {
        bootloader.efi = Some(Efi::default());
    }
    if let Some(efi) = bootloader.efi.as_mut() {
        if efi.secure_boot.is_none() {
            efi.secure_boot = preferred.preferred_use_secure_boot;
        }
    }
}
