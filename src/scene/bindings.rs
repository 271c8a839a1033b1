//! Scene bindings: named materials, textures and spheres.
//!
//! Materials and textures live in one [`Registry`] addressed by handles
//! handed out at insertion, shared by scene spheres and the avatar. Geometry
//! (`Vec<Sphere>`) and bindings are kept apart so the physics side can move
//! spheres while the renderer holds an immutable `Arc<SceneBindings>`.

use std::collections::HashMap;
use std::sync::Arc;

use super::avatar::{AvatarPart, AVATAR_SPHERES};
use super::light::InfiniteLight;
use super::material::{Material, MaterialHandle};
use super::texture::{BumpMap, Texture, TextureHandle, TextureMap};
use crate::geom::Sphere;
use crate::util::{Error, Result, Vec3};

/// Handle-indexed storage for materials and textures.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    materials: Vec<Material>,
    textures: Vec<Arc<Texture>>,
}

impl Registry {
    pub fn add_material(&mut self, material: Material) -> MaterialHandle {
        self.materials.push(material);
        MaterialHandle((self.materials.len() - 1) as u32)
    }

    pub fn add_texture(&mut self, texture: Texture) -> TextureHandle {
        self.textures.push(Arc::new(texture));
        TextureHandle((self.textures.len() - 1) as u32)
    }

    #[inline]
    pub fn material(&self, handle: MaterialHandle) -> &Material {
        &self.materials[handle.index()]
    }

    #[inline]
    pub fn texture(&self, handle: TextureHandle) -> &Texture {
        &self.textures[handle.index()]
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn textures(&self) -> impl Iterator<Item = &Texture> {
        self.textures.iter().map(|t| t.as_ref())
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }
}

/// Everything the integrator needs to shade primitive `i`.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceBinding<'a> {
    pub material: &'a Material,
    pub texture: Option<(&'a TextureMap, &'a Texture)>,
    pub bump: Option<(&'a BumpMap, &'a Texture)>,
}

/// Per-sphere material bindings plus the avatar materials and the dome light.
///
/// `materials`, `texture_maps`, `bump_maps` and `pills` are index-parallel
/// with the scene sphere array.
#[derive(Debug, Clone)]
pub struct SceneBindings {
    registry: Registry,
    materials: Vec<MaterialHandle>,
    texture_maps: Vec<Option<TextureMap>>,
    bump_maps: Vec<Option<BumpMap>>,
    pills: Vec<bool>,
    pill_count: usize,
    pills_remaining: usize,
    pill_off: Option<MaterialHandle>,
    avatar: [MaterialHandle; AVATAR_SPHERES],
    light: InfiniteLight,
}

impl SceneBindings {
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Number of scene spheres (avatar excluded).
    pub fn scene_sphere_count(&self) -> usize {
        self.materials.len()
    }

    pub fn light(&self) -> &InfiniteLight {
        &self.light
    }

    pub fn light_texture(&self) -> Option<&Texture> {
        self.light.texture.map(|h| self.registry.texture(h))
    }

    pub fn sphere_material(&self, index: usize) -> MaterialHandle {
        self.materials[index]
    }

    pub fn sphere_texture_map(&self, index: usize) -> Option<&TextureMap> {
        self.texture_maps[index].as_ref()
    }

    pub fn sphere_bump_map(&self, index: usize) -> Option<&BumpMap> {
        self.bump_maps[index].as_ref()
    }

    pub fn avatar_material(&self, part: AvatarPart) -> MaterialHandle {
        self.avatar[part.index()]
    }

    pub fn pill_count(&self) -> usize {
        self.pill_count
    }

    pub fn pills_remaining(&self) -> usize {
        self.pills_remaining
    }

    /// Resolve primitive `primitive` from the accelerator.
    ///
    /// Indices past the scene sphere count address the avatar materials;
    /// avatar parts carry no texture or bump maps.
    #[inline]
    pub fn resolve(&self, primitive: u32) -> SurfaceBinding<'_> {
        let i = primitive as usize;
        let scene_count = self.materials.len();
        if i >= scene_count {
            return SurfaceBinding {
                material: self.registry.material(self.avatar[i - scene_count]),
                texture: None,
                bump: None,
            };
        }
        SurfaceBinding {
            material: self.registry.material(self.materials[i]),
            texture: self.texture_maps[i]
                .as_ref()
                .map(|m| (m, self.registry.texture(m.texture))),
            bump: self.bump_maps[i]
                .as_ref()
                .map(|b| (b, self.registry.texture(b.texture))),
        }
    }
}

/// Named scene under construction and edit.
#[derive(Debug, Clone)]
pub struct Scene {
    material_names: HashMap<String, MaterialHandle>,
    texture_names: HashMap<String, TextureHandle>,
    sphere_names: HashMap<String, usize>,
    spheres: Vec<Sphere>,
    bindings: Arc<SceneBindings>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    /// Empty scene under a uniform white dome, with default avatar materials.
    pub fn new() -> Self {
        let mut registry = Registry::default();
        let body = registry.add_material(Material::matte(Vec3::new(0.9, 0.75, 0.1)));
        let eye = registry.add_material(Material::matte(Vec3::splat(0.9)));
        let pupil = registry.add_material(Material::matte(Vec3::splat(0.02)));
        let nose = registry.add_material(Material::metal(Vec3::new(0.8, 0.2, 0.2), 50.0));

        let mut material_names = HashMap::new();
        material_names.insert("avatar.body".to_string(), body);
        material_names.insert("avatar.eye".to_string(), eye);
        material_names.insert("avatar.pupil".to_string(), pupil);
        material_names.insert("avatar.nose".to_string(), nose);

        Self {
            material_names,
            texture_names: HashMap::new(),
            sphere_names: HashMap::new(),
            spheres: Vec::new(),
            bindings: Arc::new(SceneBindings {
                registry,
                materials: Vec::new(),
                texture_maps: Vec::new(),
                bump_maps: Vec::new(),
                pills: Vec::new(),
                pill_count: 0,
                pills_remaining: 0,
                pill_off: None,
                avatar: [body, eye, eye, pupil, pupil, nose],
                light: InfiniteLight::default(),
            }),
        }
    }

    fn bindings_mut(&mut self) -> &mut SceneBindings {
        Arc::make_mut(&mut self.bindings)
    }

    /// Register a texture under a unique name.
    pub fn add_texture(&mut self, name: &str, texture: Texture) -> Result<TextureHandle> {
        if self.texture_names.contains_key(name) {
            return Err(Error::DuplicateName { kind: "texture", name: name.to_string() });
        }
        let handle = self.bindings_mut().registry.add_texture(texture);
        self.texture_names.insert(name.to_string(), handle);
        Ok(handle)
    }

    /// Register a material under a unique name.
    pub fn add_material(&mut self, name: &str, material: Material) -> Result<MaterialHandle> {
        if self.material_names.contains_key(name) {
            return Err(Error::DuplicateName { kind: "material", name: name.to_string() });
        }
        let handle = self.bindings_mut().registry.add_material(material);
        self.material_names.insert(name.to_string(), handle);
        Ok(handle)
    }

    /// Add a sphere bound to a registered material; returns its index.
    pub fn add_sphere(&mut self, name: &str, sphere: Sphere, material: &str) -> Result<usize> {
        if self.sphere_names.contains_key(name) {
            return Err(Error::DuplicateName { kind: "sphere", name: name.to_string() });
        }
        let handle = self.material(material)?;
        let index = self.spheres.len();
        self.spheres.push(sphere);
        let b = self.bindings_mut();
        b.materials.push(handle);
        b.texture_maps.push(None);
        b.bump_maps.push(None);
        b.pills.push(false);
        self.sphere_names.insert(name.to_string(), index);
        Ok(index)
    }

    /// Add a win-condition pill sphere.
    pub fn add_pill(&mut self, name: &str, sphere: Sphere, material: &str) -> Result<usize> {
        let index = self.add_sphere(name, sphere, material)?;
        let b = self.bindings_mut();
        b.pills[index] = true;
        b.pill_count += 1;
        b.pills_remaining += 1;
        Ok(index)
    }

    pub fn set_pill_off_material(&mut self, material: &str) -> Result<()> {
        let handle = self.material(material)?;
        self.bindings_mut().pill_off = Some(handle);
        Ok(())
    }

    /// Rebind a collected pill to the pill-off material.
    ///
    /// Returns false if `index` is not a live pill or no pill-off material is set.
    pub fn switch_off_pill(&mut self, index: usize) -> bool {
        let Some(off) = self.bindings.pill_off else { return false };
        if !self.bindings.pills.get(index).copied().unwrap_or(false) || self.bindings.materials[index] == off {
            return false;
        }
        let b = self.bindings_mut();
        b.materials[index] = off;
        b.pills_remaining -= 1;
        true
    }

    pub fn is_pill(&self, index: usize) -> bool {
        self.bindings.pills.get(index).copied().unwrap_or(false)
    }

    pub fn set_texture_map(&mut self, sphere: &str, map: TextureMap) -> Result<()> {
        let index = self.sphere_index(sphere)?;
        self.bindings_mut().texture_maps[index] = Some(map);
        Ok(())
    }

    pub fn set_bump_map(&mut self, sphere: &str, map: BumpMap) -> Result<()> {
        let index = self.sphere_index(sphere)?;
        self.bindings_mut().bump_maps[index] = Some(map);
        Ok(())
    }

    pub fn set_avatar_material(&mut self, part: AvatarPart, material: &str) -> Result<()> {
        let handle = self.material(material)?;
        self.bindings_mut().avatar[part.index()] = handle;
        Ok(())
    }

    pub fn set_light(&mut self, light: InfiniteLight) {
        self.bindings_mut().light = light;
    }

    pub fn material(&self, name: &str) -> Result<MaterialHandle> {
        self.material_names
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownName { kind: "material", name: name.to_string() })
    }

    pub fn texture(&self, name: &str) -> Result<TextureHandle> {
        self.texture_names
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownName { kind: "texture", name: name.to_string() })
    }

    pub fn sphere_index(&self, name: &str) -> Result<usize> {
        self.sphere_names
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownName { kind: "sphere", name: name.to_string() })
    }

    pub fn spheres(&self) -> &[Sphere] {
        &self.spheres
    }

    /// Mutable geometry. Count and order must stay fixed; bindings are by index.
    pub fn spheres_mut(&mut self) -> &mut [Sphere] {
        &mut self.spheres
    }

    pub fn bindings(&self) -> &Arc<SceneBindings> {
        &self.bindings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene() -> Scene {
        let mut s = Scene::new();
        s.add_material("red", Material::matte(Vec3::new(0.8, 0.1, 0.1))).unwrap();
        s.add_material("off", Material::matte(Vec3::splat(0.1))).unwrap();
        s.add_sphere("floor", Sphere::new(Vec3::new(0.0, -1000.0, 0.0), 999.0), "red").unwrap();
        s
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut s = scene();
        assert!(matches!(
            s.add_material("red", Material::mirror(Vec3::ONE)),
            Err(Error::DuplicateName { kind: "material", .. })
        ));
        assert!(s.add_sphere("floor", Sphere::new(Vec3::ZERO, 1.0), "red").is_err());
        assert!(matches!(
            s.add_sphere("ball", Sphere::new(Vec3::ZERO, 1.0), "blue"),
            Err(Error::UnknownName { kind: "material", .. })
        ));
    }

    #[test]
    fn test_parallel_arrays_stay_in_sync() {
        let mut s = scene();
        s.add_sphere("a", Sphere::new(Vec3::ZERO, 1.0), "red").unwrap();
        let t = s.add_texture("tex", Texture::constant(Vec3::ONE)).unwrap();
        s.set_texture_map("a", TextureMap::new(t)).unwrap();
        let b = s.bindings();
        assert_eq!(b.scene_sphere_count(), s.spheres().len());
        assert!(b.sphere_texture_map(1).is_some());
        assert!(b.sphere_texture_map(0).is_none());
        assert!(b.sphere_bump_map(1).is_none());
    }

    #[test]
    fn test_resolve_two_ranges() {
        let s = scene();
        let b = s.bindings();
        let floor = b.resolve(0);
        assert_eq!(*floor.material, Material::matte(Vec3::new(0.8, 0.1, 0.1)));
        let nose = b.resolve((b.scene_sphere_count() + AvatarPart::Nose.index()) as u32);
        assert_eq!(*nose.material, *b.registry().material(b.avatar_material(AvatarPart::Nose)));
        assert!(nose.texture.is_none());
    }

    #[test]
    fn test_pill_switch_off() {
        let mut s = scene();
        let p = s.add_pill("pill0", Sphere::new(Vec3::ONE, 0.5), "red").unwrap();
        assert!(s.is_pill(p));
        assert!(!s.switch_off_pill(p), "no pill-off material yet");
        s.set_pill_off_material("off").unwrap();

        let before = Arc::clone(s.bindings());
        assert!(s.switch_off_pill(p));
        assert!(!s.switch_off_pill(p));
        assert!(!s.switch_off_pill(0));
        assert_eq!(s.bindings().pill_count(), 1);
        assert_eq!(s.bindings().pills_remaining(), 0);
        // earlier snapshots are unaffected
        assert_eq!(before.pills_remaining(), 1);
        assert_eq!(s.bindings().sphere_material(p), s.material("off").unwrap());
    }
}
