//! Resource collection
//!
//! The set of Kubernetes objects produced by one pass of the trait pipeline.
//! Objects are stored in insertion order, at most one per kind and name:
//! adding an object whose kind and name already exist replaces it in place.
//!
//! Access is typed. `get_mut::<Deployment>("my-it")` or
//! `visit_mut::<CronJob>(..)` hand out `&mut T` for the duration of the
//! borrow, so a trait only ever touches the kinds it asks for.

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::batch::v1::CronJob;
use k8s_openapi::api::core::v1::{ConfigMap, Container, PodSpec, Secret, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::ApiResource;

use camel_common::crd::KnativeService;
use camel_common::kube_utils::HasApiResource;
use camel_common::{Error, Result};

/// An object held by the collection
#[derive(Clone, Debug, PartialEq)]
pub enum KubeResource {
    /// apps/v1 Deployment
    Deployment(Deployment),
    /// v1 Service
    Service(Service),
    /// batch/v1 CronJob
    CronJob(CronJob),
    /// v1 ConfigMap
    ConfigMap(ConfigMap),
    /// v1 Secret
    Secret(Secret),
    /// serving.knative.dev/v1 Service
    KnativeService(KnativeService),
}

impl KubeResource {
    /// Kind, qualified for kinds whose short name is ambiguous
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Deployment(_) => <Deployment as CollectedResource>::KIND,
            Self::Service(_) => <Service as CollectedResource>::KIND,
            Self::CronJob(_) => <CronJob as CollectedResource>::KIND,
            Self::ConfigMap(_) => <ConfigMap as CollectedResource>::KIND,
            Self::Secret(_) => <Secret as CollectedResource>::KIND,
            Self::KnativeService(_) => <KnativeService as CollectedResource>::KIND,
        }
    }

    /// Object metadata
    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            Self::Deployment(r) => &r.metadata,
            Self::Service(r) => &r.metadata,
            Self::CronJob(r) => &r.metadata,
            Self::ConfigMap(r) => &r.metadata,
            Self::Secret(r) => &r.metadata,
            Self::KnativeService(r) => &r.metadata,
        }
    }

    /// Mutable object metadata
    pub fn metadata_mut(&mut self) -> &mut ObjectMeta {
        match self {
            Self::Deployment(r) => &mut r.metadata,
            Self::Service(r) => &mut r.metadata,
            Self::CronJob(r) => &mut r.metadata,
            Self::ConfigMap(r) => &mut r.metadata,
            Self::Secret(r) => &mut r.metadata,
            Self::KnativeService(r) => &mut r.metadata,
        }
    }

    /// Object name (empty when unset)
    pub fn name(&self) -> &str {
        self.metadata().name.as_deref().unwrap_or_default()
    }

    /// API coordinates used to submit the object
    pub fn api_resource(&self) -> ApiResource {
        match self {
            Self::Deployment(_) => ApiResource::erase::<Deployment>(&()),
            Self::Service(_) => ApiResource::erase::<Service>(&()),
            Self::CronJob(_) => ApiResource::erase::<CronJob>(&()),
            Self::ConfigMap(_) => ApiResource::erase::<ConfigMap>(&()),
            Self::Secret(_) => ApiResource::erase::<Secret>(&()),
            Self::KnativeService(_) => KnativeService::api_resource(),
        }
    }

    /// Serialized form, including `apiVersion` and `kind`
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let value = match self {
            Self::Deployment(r) => serde_json::to_value(r)?,
            Self::Service(r) => serde_json::to_value(r)?,
            Self::CronJob(r) => serde_json::to_value(r)?,
            Self::ConfigMap(r) => serde_json::to_value(r)?,
            Self::Secret(r) => serde_json::to_value(r)?,
            Self::KnativeService(r) => serde_json::to_value(r)?,
        };
        Ok(value)
    }

    /// Pod template of workload kinds
    pub fn pod_spec_mut(&mut self) -> Option<&mut PodSpec> {
        match self {
            Self::Deployment(d) => d.spec.as_mut()?.template.spec.as_mut(),
            Self::CronJob(c) => c
                .spec
                .as_mut()?
                .job_template
                .spec
                .as_mut()?
                .template
                .spec
                .as_mut(),
            Self::KnativeService(k) => Some(&mut k.spec.template.spec.pod_spec),
            _ => None,
        }
    }

    /// Pod template metadata of workload kinds
    pub fn pod_template_meta_mut(&mut self) -> Option<&mut ObjectMeta> {
        match self {
            Self::Deployment(d) => Some(
                d.spec
                    .as_mut()?
                    .template
                    .metadata
                    .get_or_insert_with(Default::default),
            ),
            Self::CronJob(c) => Some(
                c.spec
                    .as_mut()?
                    .job_template
                    .spec
                    .as_mut()?
                    .template
                    .metadata
                    .get_or_insert_with(Default::default),
            ),
            Self::KnativeService(k) => Some(&mut k.spec.template.metadata),
            _ => None,
        }
    }
}

/// Types that can be stored in a [`ResourceCollection`]
pub trait CollectedResource: Sized {
    /// Kind used for identity in the collection
    const KIND: &'static str;

    /// Wrap into the collection enum
    fn into_resource(self) -> KubeResource;

    /// Borrow from the collection enum when the kind matches
    fn from_resource(resource: &KubeResource) -> Option<&Self>;

    /// Mutably borrow from the collection enum when the kind matches
    fn from_resource_mut(resource: &mut KubeResource) -> Option<&mut Self>;

    /// Take ownership when the kind matches
    fn try_from_resource(resource: KubeResource) -> std::result::Result<Self, KubeResource>;
}

macro_rules! collected_resource {
    ($ty:ty, $variant:ident, $kind:literal) => {
        impl CollectedResource for $ty {
            const KIND: &'static str = $kind;

            fn into_resource(self) -> KubeResource {
                KubeResource::$variant(self)
            }

            fn from_resource(resource: &KubeResource) -> Option<&Self> {
                match resource {
                    KubeResource::$variant(r) => Some(r),
                    _ => None,
                }
            }

            fn from_resource_mut(resource: &mut KubeResource) -> Option<&mut Self> {
                match resource {
                    KubeResource::$variant(r) => Some(r),
                    _ => None,
                }
            }

            fn try_from_resource(resource: KubeResource) -> std::result::Result<Self, KubeResource> {
                match resource {
                    KubeResource::$variant(r) => Ok(r),
                    other => Err(other),
                }
            }
        }

        impl From<$ty> for KubeResource {
            fn from(r: $ty) -> Self {
                KubeResource::$variant(r)
            }
        }
    };
}

collected_resource!(Deployment, Deployment, "Deployment");
collected_resource!(Service, Service, "Service");
collected_resource!(CronJob, CronJob, "CronJob");
collected_resource!(ConfigMap, ConfigMap, "ConfigMap");
collected_resource!(Secret, Secret, "Secret");
collected_resource!(KnativeService, KnativeService, "Service.serving.knative.dev");

/// Ordered, kind+name unique set of Kubernetes objects
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResourceCollection {
    items: Vec<KubeResource>,
}

impl ResourceCollection {
    /// Empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object, replacing an existing one with the same kind and name
    pub fn add(&mut self, resource: impl Into<KubeResource>) {
        let resource = resource.into();
        let existing = self
            .items
            .iter()
            .position(|r| r.kind() == resource.kind() && r.name() == resource.name());
        match existing {
            Some(index) => self.items[index] = resource,
            None => self.items.push(resource),
        }
    }

    /// Add every object
    pub fn add_all<I, R>(&mut self, resources: I)
    where
        I: IntoIterator<Item = R>,
        R: Into<KubeResource>,
    {
        for resource in resources {
            self.add(resource);
        }
    }

    /// Number of objects
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when the collection holds nothing
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// All objects in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &KubeResource> {
        self.items.iter()
    }

    /// All objects, mutably
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut KubeResource> {
        self.items.iter_mut()
    }

    /// Object of kind `T` named `name`
    pub fn get<T: CollectedResource>(&self, name: &str) -> Option<&T> {
        self.items
            .iter()
            .filter(|r| r.name() == name)
            .find_map(T::from_resource)
    }

    /// Object of kind `T` named `name`, mutably
    pub fn get_mut<T: CollectedResource>(&mut self, name: &str) -> Option<&mut T> {
        self.items
            .iter_mut()
            .filter(|r| r.name() == name)
            .find_map(T::from_resource_mut)
    }

    /// First object of kind `T`
    pub fn first<T: CollectedResource>(&self) -> Option<&T> {
        self.items.iter().find_map(T::from_resource)
    }

    /// First object of kind `T`, mutably
    pub fn first_mut<T: CollectedResource>(&mut self) -> Option<&mut T> {
        self.items.iter_mut().find_map(T::from_resource_mut)
    }

    /// Object of kind `T` named `name`, created with `init` when missing
    ///
    /// `init` must produce an object named `name`.
    pub fn get_or_create<T, F>(&mut self, name: &str, init: F) -> Result<&mut T>
    where
        T: CollectedResource,
        F: FnOnce() -> T,
    {
        let index = match self
            .items
            .iter()
            .position(|r| r.name() == name && T::from_resource(r).is_some())
        {
            Some(index) => index,
            None => {
                self.items.push(init().into_resource());
                self.items.len() - 1
            }
        };
        T::from_resource_mut(&mut self.items[index]).ok_or_else(|| {
            Error::internal_with_context(
                "resource-collection",
                format!("{} {name} has an unexpected kind", T::KIND),
            )
        })
    }

    /// Call `f` on every object of kind `T`
    pub fn visit<T: CollectedResource>(&self, mut f: impl FnMut(&T)) {
        self.items.iter().filter_map(T::from_resource).for_each(&mut f);
    }

    /// Call `f` on every object of kind `T`, mutably
    pub fn visit_mut<T: CollectedResource>(&mut self, mut f: impl FnMut(&mut T)) {
        self.items
            .iter_mut()
            .filter_map(T::from_resource_mut)
            .for_each(&mut f);
    }

    /// Call `f` on every object of kind `T` until it fails
    pub fn try_visit_mut<T: CollectedResource>(
        &mut self,
        mut f: impl FnMut(&mut T) -> Result<()>,
    ) -> Result<()> {
        for item in self.items.iter_mut().filter_map(T::from_resource_mut) {
            f(item)?;
        }
        Ok(())
    }

    /// Number of objects of kind `T`
    pub fn count<T: CollectedResource>(&self) -> usize {
        self.items.iter().filter_map(T::from_resource).count()
    }

    /// Remove and return the object of kind `T` named `name`
    pub fn remove<T: CollectedResource>(&mut self, name: &str) -> Option<T> {
        let index = self
            .items
            .iter()
            .position(|r| r.name() == name && T::from_resource(r).is_some())?;
        T::try_from_resource(self.items.remove(index)).ok()
    }

    /// Pod templates of every Deployment, CronJob and Knative Service
    pub fn pod_specs_mut(&mut self) -> Vec<&mut PodSpec> {
        self.items
            .iter_mut()
            .filter_map(KubeResource::pod_spec_mut)
            .collect()
    }

    /// Pod template metadata of every Deployment, CronJob and Knative Service
    pub fn pod_templates_meta_mut(&mut self) -> Vec<&mut ObjectMeta> {
        self.items
            .iter_mut()
            .filter_map(KubeResource::pod_template_meta_mut)
            .collect()
    }

    /// Containers named `name` across every pod template
    pub fn containers_mut(&mut self, name: &str) -> Vec<&mut Container> {
        self.pod_specs_mut()
            .into_iter()
            .flat_map(|spec| spec.containers.iter_mut())
            .filter(|c| c.name == name)
            .collect()
    }

    /// Multi-document YAML rendering
    pub fn to_yaml(&self) -> Result<String> {
        let mut out = String::new();
        for item in &self.items {
            out.push_str("---\n");
            out.push_str(&serde_yaml::to_string(&item.to_json()?)?);
        }
        Ok(out)
    }
}

impl<'a> IntoIterator for &'a ResourceCollection {
    type Item = &'a KubeResource;
    type IntoIter = std::slice::Iter<'a, KubeResource>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Metadata with just a name and namespace
pub fn named(name: &str, namespace: &str) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: (!namespace.is_empty()).then(|| namespace.to_string()),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::DeploymentSpec;
    use k8s_openapi::api::batch::v1::{CronJobSpec, JobSpec, JobTemplateSpec};
    use k8s_openapi::api::core::v1::PodTemplateSpec;

    fn deployment(name: &str, image: &str) -> Deployment {
        Deployment {
            metadata: named(name, "default"),
            spec: Some(DeploymentSpec {
                template: PodTemplateSpec {
                    spec: Some(PodSpec {
                        containers: vec![Container {
                            name: "integration".to_string(),
                            image: Some(image.to_string()),
                            ..Default::default()
                        }],
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn cron_job(name: &str) -> CronJob {
        CronJob {
            metadata: named(name, "default"),
            spec: Some(CronJobSpec {
                schedule: "* * * * *".to_string(),
                job_template: JobTemplateSpec {
                    spec: Some(JobSpec {
                        template: PodTemplateSpec {
                            spec: Some(PodSpec {
                                containers: vec![Container {
                                    name: "integration".to_string(),
                                    ..Default::default()
                                }],
                                ..Default::default()
                            }),
                            ..Default::default()
                        },
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Story: adding the same kind and name twice keeps one object
    #[test]
    fn story_duplicate_kind_and_name_replaces_in_place() {
        let mut resources = ResourceCollection::new();
        resources.add(deployment("a", "img:1"));
        resources.add(ConfigMap {
            metadata: named("a", "default"),
            ..Default::default()
        });
        resources.add(deployment("a", "img:2"));

        assert_eq!(resources.len(), 2);
        assert_eq!(resources.iter().next().map(KubeResource::kind), Some("Deployment"));
        let image = resources
            .get::<Deployment>("a")
            .and_then(|d| d.spec.as_ref())
            .and_then(|s| s.template.spec.as_ref())
            .and_then(|p| p.containers[0].image.clone());
        assert_eq!(image.as_deref(), Some("img:2"));
    }

    /// Story: visitors only see their own kind
    #[test]
    fn story_typed_visitors_touch_only_their_kind() {
        let mut resources = ResourceCollection::new();
        resources.add(deployment("a", "img"));
        resources.add(cron_job("b"));
        resources.add(Service {
            metadata: named("a", "default"),
            ..Default::default()
        });

        let mut seen = Vec::new();
        resources.visit_mut::<Deployment>(|d| {
            seen.push(d.metadata.name.clone().unwrap_or_default());
            d.metadata.labels = Some([("x".to_string(), "y".to_string())].into());
        });
        assert_eq!(seen, vec!["a"]);
        assert!(resources.get::<Service>("a").unwrap().metadata.labels.is_none());
        assert!(resources.get::<Deployment>("a").unwrap().metadata.labels.is_some());
        assert_eq!(resources.count::<CronJob>(), 1);
        assert!(resources.get::<KnativeService>("a").is_none());
    }

    #[test]
    fn pod_specs_cover_every_workload_kind() {
        let mut resources = ResourceCollection::new();
        resources.add(deployment("a", "img"));
        resources.add(cron_job("b"));
        resources.add(KnativeService::new(named("c", "default")));
        resources.add(ConfigMap::default());

        assert_eq!(resources.pod_specs_mut().len(), 3);
        assert_eq!(resources.containers_mut("integration").len(), 2);
    }

    #[test]
    fn get_or_create_and_remove() {
        let mut resources = ResourceCollection::new();
        resources
            .get_or_create::<ConfigMap, _>("cfg", || ConfigMap {
                metadata: named("cfg", "default"),
                ..Default::default()
            })
            .unwrap()
            .data = Some([("k".to_string(), "v".to_string())].into());
        resources
            .get_or_create::<ConfigMap, _>("cfg", ConfigMap::default)
            .unwrap();
        assert_eq!(resources.len(), 1);
        assert!(resources.get::<ConfigMap>("cfg").unwrap().data.is_some());

        let removed = resources.remove::<ConfigMap>("cfg");
        assert!(removed.is_some());
        assert!(resources.is_empty());
        assert!(resources.remove::<ConfigMap>("cfg").is_none());
    }

    #[test]
    fn yaml_rendering_includes_type_meta() {
        let mut resources = ResourceCollection::new();
        resources.add(deployment("a", "img"));
        let yaml = resources.to_yaml().unwrap();
        assert!(yaml.starts_with("---\n"));
        assert!(yaml.contains("kind: Deployment"));
        assert!(yaml.contains("apiVersion: apps/v1"));
    }
}
