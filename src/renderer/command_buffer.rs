// renderer/command_buffer.rs
//
// Recording is pure data capture: no GPU work happens until the present
// thread executes the buffer through the render context. A buffer owns
// shared references to meshes/materials/textures so they outlive the frame,
// but only weak references to cameras and lights; the caller guarantees
// those outlive one frame.

use std::cmp::Ordering;
use std::sync::{Arc, Weak};

use glam::{Mat4, Vec3};

use crate::renderer::resources::{Cubemap, Material, Mesh, RenderTarget, ScissorRect, Texture2D};
use crate::scene::camera::Camera;
use crate::scene::light::Light;

/// Endpoint of a blit: the screen backbuffer, whatever target was bound
/// when the blit executes, or an explicit target.
#[derive(Clone, Debug)]
pub enum BlitSurface {
    Screen,
    Previous,
    Target(Arc<RenderTarget>),
}

/// One recorded GPU operation. A closed set; the execution side matches
/// exhaustively so a new variant fails to compile until every backend path
/// handles it.
#[derive(Clone, Debug)]
pub enum GpuCommand {
    SetCamera(Weak<Camera>),
    EndCamera(Weak<Camera>),
    DrawMesh {
        mesh: Arc<Mesh>,
        material: Arc<Material>,
        model: Mat4,
        submesh: u32,
    },
    DrawMeshInstanced {
        mesh: Arc<Mesh>,
        material: Arc<Material>,
        model: Mat4,
        instance_count: u32,
    },
    DrawLight(Weak<Light>),
    /// `None` binds the screen/backbuffer.
    SetRenderTarget(Option<Arc<RenderTarget>>),
    DrawFullscreenQuad(Arc<Material>),
    RenderCubemap {
        cubemap: Arc<Cubemap>,
        material: Arc<Material>,
        dst_mip: u32,
    },
    Blit {
        src: BlitSurface,
        dst: BlitSurface,
        material: Arc<Material>,
    },
    SetScissor(ScissorRect),
    SetCameraMatrix {
        member: String,
        matrix: Mat4,
    },
    CopyTexture {
        src: Arc<Texture2D>,
        src_element: u32,
        src_mip: u32,
        dst: Arc<Texture2D>,
        dst_element: u32,
        dst_mip: u32,
    },
}

impl GpuCommand {
    /// Draw-type commands are the ones `sort_draw_commands` reorders.
    fn draw_translation(&self) -> Option<Vec3> {
        match self {
            GpuCommand::DrawMesh { model, .. } | GpuCommand::DrawMeshInstanced { model, .. } => {
                Some(model.w_axis.truncate())
            }
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct CommandBuffer {
    commands: Vec<GpuCommand>,
    open_camera: Option<Weak<Camera>>,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[GpuCommand] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Open a camera span. Nesting spans is a bug in the recording code,
    /// not bad input data, and fails hard.
    pub fn set_camera(&mut self, camera: &Arc<Camera>) {
        assert!(
            self.open_camera.is_none(),
            "set_camera while a camera span is already open"
        );
        self.open_camera = Some(Arc::downgrade(camera));
        self.commands.push(GpuCommand::SetCamera(Arc::downgrade(camera)));
    }

    pub fn end_camera(&mut self, camera: &Arc<Camera>) {
        let open = self
            .open_camera
            .take()
            .expect("end_camera without an open camera span");
        assert!(
            open.ptr_eq(&Arc::downgrade(camera)),
            "end_camera for a different camera than set_camera"
        );
        self.commands.push(GpuCommand::EndCamera(Arc::downgrade(camera)));
    }

    pub fn draw_mesh(
        &mut self,
        mesh: &Arc<Mesh>,
        material: &Arc<Material>,
        model: Mat4,
        submesh: u32,
    ) {
        self.commands.push(GpuCommand::DrawMesh {
            mesh: mesh.clone(),
            material: material.clone(),
            model,
            submesh,
        });
    }

    pub fn draw_mesh_instanced(
        &mut self,
        mesh: &Arc<Mesh>,
        material: &Arc<Material>,
        model: Mat4,
        instance_count: u32,
    ) {
        self.commands.push(GpuCommand::DrawMeshInstanced {
            mesh: mesh.clone(),
            material: material.clone(),
            model,
            instance_count,
        });
    }

    pub fn draw_light(&mut self, light: &Arc<Light>) {
        self.commands.push(GpuCommand::DrawLight(Arc::downgrade(light)));
    }

    pub fn set_render_target(&mut self, target: Option<&Arc<RenderTarget>>) {
        self.commands
            .push(GpuCommand::SetRenderTarget(target.cloned()));
    }

    pub fn draw_fullscreen_quad(&mut self, material: &Arc<Material>) {
        self.commands
            .push(GpuCommand::DrawFullscreenQuad(material.clone()));
    }

    pub fn render_cubemap(&mut self, cubemap: &Arc<Cubemap>, material: &Arc<Material>, dst_mip: u32) {
        self.commands.push(GpuCommand::RenderCubemap {
            cubemap: cubemap.clone(),
            material: material.clone(),
            dst_mip,
        });
    }

    pub fn blit(&mut self, src: BlitSurface, dst: BlitSurface, material: &Arc<Material>) {
        self.commands.push(GpuCommand::Blit {
            src,
            dst,
            material: material.clone(),
        });
    }

    pub fn set_scissor(&mut self, rect: ScissorRect) {
        self.commands.push(GpuCommand::SetScissor(rect));
    }

    pub fn set_camera_matrix(&mut self, member: impl Into<String>, matrix: Mat4) {
        self.commands.push(GpuCommand::SetCameraMatrix {
            member: member.into(),
            matrix,
        });
    }

    #[allow(clippy::too_many_arguments)]
    pub fn copy_texture(
        &mut self,
        src: &Arc<Texture2D>,
        src_element: u32,
        src_mip: u32,
        dst: &Arc<Texture2D>,
        dst_element: u32,
        dst_mip: u32,
    ) {
        self.commands.push(GpuCommand::CopyTexture {
            src: src.clone(),
            src_element,
            src_mip,
            dst: dst.clone(),
            dst_element,
            dst_mip,
        });
    }

    /// Append another buffer's commands, preserving their order. Used to
    /// fold independently-recorded Geometry/PostProcess/Overlay buffers
    /// into a camera's primary buffer.
    pub fn merge(&mut self, other: &CommandBuffer) {
        self.commands.extend(other.commands.iter().cloned());
    }

    /// Stable back-to-front sort of the draw-type commands by distance of
    /// each model-matrix translation to `point`. Every other command keeps
    /// its exact position; equal distances keep their recording order.
    pub fn sort_draw_commands(&mut self, point: Vec3) {
        let mut slots = Vec::new();
        let mut draws = Vec::new();
        for (index, cmd) in self.commands.iter().enumerate() {
            if let Some(translation) = cmd.draw_translation() {
                slots.push(index);
                draws.push(((translation - point).length_squared(), cmd.clone()));
            }
        }
        if draws.len() < 2 {
            return;
        }

        draws.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        for (slot, (_, cmd)) in slots.into_iter().zip(draws) {
            self.commands[slot] = cmd;
        }
    }

    /// Drop every recorded command and close any open span bookkeeping.
    pub fn reset(&mut self) {
        self.commands.clear();
        self.open_camera = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draw_at(cmd: &mut CommandBuffer, mesh: &Arc<Mesh>, material: &Arc<Material>, x: f32) {
        cmd.draw_mesh(mesh, material, Mat4::from_translation(Vec3::new(x, 0.0, 0.0)), 0);
    }

    fn test_mesh() -> Arc<Mesh> {
        Arc::new(Mesh {
            id: 0,
            name: "quad".into(),
            vertex_count: 4,
            submeshes: vec![crate::renderer::resources::SubMesh {
                start_index: 0,
                index_count: 6,
            }],
        })
    }

    fn test_material() -> Arc<Material> {
        let shader = Arc::new(crate::renderer::resources::Shader {
            id: 0,
            name: "flat".into(),
            reflection: Default::default(),
        });
        Arc::new(Material::new("flat", shader))
    }

    fn drawn_x(cmd: &GpuCommand) -> f32 {
        match cmd {
            GpuCommand::DrawMesh { model, .. } => model.w_axis.x,
            _ => panic!("not a draw"),
        }
    }

    #[test]
    fn sort_is_back_to_front() {
        let mesh = test_mesh();
        let material = test_material();
        let mut cmd = CommandBuffer::new();
        draw_at(&mut cmd, &mesh, &material, 1.0);
        draw_at(&mut cmd, &mesh, &material, 5.0);
        draw_at(&mut cmd, &mesh, &material, 3.0);

        cmd.sort_draw_commands(Vec3::ZERO);

        let xs: Vec<f32> = cmd.commands().iter().map(drawn_x).collect();
        assert_eq!(xs, vec![5.0, 3.0, 1.0]);
    }

    #[test]
    fn sort_leaves_other_commands_in_place() {
        let mesh = test_mesh();
        let material = test_material();
        let mut cmd = CommandBuffer::new();
        draw_at(&mut cmd, &mesh, &material, 1.0);
        cmd.set_scissor(ScissorRect {
            x: 0,
            y: 0,
            width: 10,
            height: 10,
        });
        draw_at(&mut cmd, &mesh, &material, 9.0);

        cmd.sort_draw_commands(Vec3::ZERO);

        assert!(matches!(cmd.commands()[1], GpuCommand::SetScissor(_)));
        assert_eq!(drawn_x(&cmd.commands()[0]), 9.0);
        assert_eq!(drawn_x(&cmd.commands()[2]), 1.0);
    }

    #[test]
    fn sort_is_stable_for_equal_distances() {
        let mesh = test_mesh();
        let material = test_material();
        let mut cmd = CommandBuffer::new();
        // Same distance from the origin, distinguishable by submesh index.
        cmd.draw_mesh(&mesh, &material, Mat4::from_translation(Vec3::X), 0);
        cmd.draw_mesh(&mesh, &material, Mat4::from_translation(Vec3::NEG_X), 1);
        cmd.draw_mesh(&mesh, &material, Mat4::from_translation(Vec3::Y), 2);

        cmd.sort_draw_commands(Vec3::ZERO);

        let submeshes: Vec<u32> = cmd
            .commands()
            .iter()
            .map(|c| match c {
                GpuCommand::DrawMesh { submesh, .. } => *submesh,
                _ => panic!("not a draw"),
            })
            .collect();
        assert_eq!(submeshes, vec![0, 1, 2]);
    }

    #[test]
    fn merge_preserves_order() {
        let mesh = test_mesh();
        let material = test_material();
        let mut a = CommandBuffer::new();
        draw_at(&mut a, &mesh, &material, 1.0);
        let mut b = CommandBuffer::new();
        draw_at(&mut b, &mesh, &material, 2.0);
        draw_at(&mut b, &mesh, &material, 3.0);

        a.merge(&b);
        let xs: Vec<f32> = a.commands().iter().map(drawn_x).collect();
        assert_eq!(xs, vec![1.0, 2.0, 3.0]);
        assert_eq!(b.len(), 2, "merge must not consume the source");
    }

    #[test]
    fn reset_clears_everything() {
        let mesh = test_mesh();
        let material = test_material();
        let camera = Arc::new(Camera::new("main"));
        let mut cmd = CommandBuffer::new();
        cmd.set_camera(&camera);
        draw_at(&mut cmd, &mesh, &material, 1.0);
        cmd.reset();
        assert!(cmd.is_empty());
        // A fresh span can open after reset.
        cmd.set_camera(&camera);
    }

    #[test]
    #[should_panic(expected = "set_camera while a camera span is already open")]
    fn nested_camera_span_panics() {
        let camera = Arc::new(Camera::new("main"));
        let mut cmd = CommandBuffer::new();
        cmd.set_camera(&camera);
        cmd.set_camera(&camera);
    }

    #[test]
    #[should_panic(expected = "end_camera without an open camera span")]
    fn end_without_open_span_panics() {
        let camera = Arc::new(Camera::new("main"));
        let mut cmd = CommandBuffer::new();
        cmd.end_camera(&camera);
    }
}
